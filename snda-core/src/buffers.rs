//! Columnar buffer exchange contract
//!
//! `ArrayBuffers` is the structure exchanged across the storage-engine
//! boundary: produced chunk-by-chunk on read, consumed whole on write. It
//! is an ordered set of named, typed columns with equal row counts,
//! deliberately decoupled from the engine's native representation.
//!
//! A read chunk boundary is a buffer-capacity artifact, not a logical
//! record boundary; consumers concatenate chunks with [`ArrayBuffers::append`]
//! to reconstruct a full result set.

use hashbrown::HashMap;

use crate::datatype::DataType;
use crate::error::{Result, SndaError};
use crate::value::DimensionValue;

/// Typed storage for one column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

macro_rules! per_variant {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            ColumnData::Int8($v) => $body,
            ColumnData::Int16($v) => $body,
            ColumnData::Int32($v) => $body,
            ColumnData::Int64($v) => $body,
            ColumnData::UInt8($v) => $body,
            ColumnData::UInt16($v) => $body,
            ColumnData::UInt32($v) => $body,
            ColumnData::UInt64($v) => $body,
            ColumnData::Float32($v) => $body,
            ColumnData::Float64($v) => $body,
            ColumnData::Bool($v) => $body,
            ColumnData::Str($v) => $body,
        }
    };
}

impl ColumnData {
    /// Empty storage for the given type
    pub fn new(dtype: DataType) -> Self {
        match dtype {
            DataType::Int8 => ColumnData::Int8(Vec::new()),
            DataType::Int16 => ColumnData::Int16(Vec::new()),
            DataType::Int32 => ColumnData::Int32(Vec::new()),
            DataType::Int64 => ColumnData::Int64(Vec::new()),
            DataType::UInt8 => ColumnData::UInt8(Vec::new()),
            DataType::UInt16 => ColumnData::UInt16(Vec::new()),
            DataType::UInt32 => ColumnData::UInt32(Vec::new()),
            DataType::UInt64 => ColumnData::UInt64(Vec::new()),
            DataType::Float32 => ColumnData::Float32(Vec::new()),
            DataType::Float64 => ColumnData::Float64(Vec::new()),
            DataType::Bool => ColumnData::Bool(Vec::new()),
            DataType::StringUtf8 => ColumnData::Str(Vec::new()),
        }
    }

    /// The datatype tag of this column
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int8(_) => DataType::Int8,
            ColumnData::Int16(_) => DataType::Int16,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::UInt8(_) => DataType::UInt8,
            ColumnData::UInt16(_) => DataType::UInt16,
            ColumnData::UInt32(_) => DataType::UInt32,
            ColumnData::UInt64(_) => DataType::UInt64,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Bool(_) => DataType::Bool,
            ColumnData::Str(_) => DataType::StringUtf8,
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        per_variant!(self, v => v.len())
    }

    /// True if the column holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tagged value at `index`, or `None` past the end.
    ///
    /// Bool columns have no tagged form and return `None`; they are not
    /// indexable and never addressed as coordinates.
    pub fn value_at(&self, index: usize) -> Option<DimensionValue> {
        match self {
            ColumnData::Int8(v) => v.get(index).map(|x| DimensionValue::Int8(*x)),
            ColumnData::Int16(v) => v.get(index).map(|x| DimensionValue::Int16(*x)),
            ColumnData::Int32(v) => v.get(index).map(|x| DimensionValue::Int32(*x)),
            ColumnData::Int64(v) => v.get(index).map(|x| DimensionValue::Int64(*x)),
            ColumnData::UInt8(v) => v.get(index).map(|x| DimensionValue::UInt8(*x)),
            ColumnData::UInt16(v) => v.get(index).map(|x| DimensionValue::UInt16(*x)),
            ColumnData::UInt32(v) => v.get(index).map(|x| DimensionValue::UInt32(*x)),
            ColumnData::UInt64(v) => v.get(index).map(|x| DimensionValue::UInt64(*x)),
            ColumnData::Float32(v) => v.get(index).map(|x| DimensionValue::Float32(*x)),
            ColumnData::Float64(v) => v.get(index).map(|x| DimensionValue::Float64(*x)),
            ColumnData::Bool(_) => None,
            ColumnData::Str(v) => v.get(index).map(|x| DimensionValue::Str(x.clone())),
        }
    }

    /// Append a tagged value; fails if the tag disagrees with the column type
    pub fn push_value(&mut self, value: &DimensionValue) -> Result<()> {
        let declared = self.data_type();
        match (self, value) {
            (ColumnData::Int8(v), DimensionValue::Int8(x)) => v.push(*x),
            (ColumnData::Int16(v), DimensionValue::Int16(x)) => v.push(*x),
            (ColumnData::Int32(v), DimensionValue::Int32(x)) => v.push(*x),
            (ColumnData::Int64(v), DimensionValue::Int64(x)) => v.push(*x),
            (ColumnData::UInt8(v), DimensionValue::UInt8(x)) => v.push(*x),
            (ColumnData::UInt16(v), DimensionValue::UInt16(x)) => v.push(*x),
            (ColumnData::UInt32(v), DimensionValue::UInt32(x)) => v.push(*x),
            (ColumnData::UInt64(v), DimensionValue::UInt64(x)) => v.push(*x),
            (ColumnData::Float32(v), DimensionValue::Float32(x)) => v.push(*x),
            (ColumnData::Float64(v), DimensionValue::Float64(x)) => v.push(*x),
            (ColumnData::Str(v), DimensionValue::Str(x)) => v.push(x.clone()),
            _ => {
                return Err(SndaError::TypeMismatch {
                    declared,
                    requested: value.data_type(),
                });
            }
        }
        Ok(())
    }

    /// Copy the value at `index` of `src` onto the end of `self`.
    ///
    /// Unlike [`ColumnData::push_value`] this covers bool columns, which
    /// have no tagged value form. Fails on a type disagreement or an
    /// out-of-bounds index.
    pub fn push_from(&mut self, src: &ColumnData, index: usize) -> Result<()> {
        let declared = self.data_type();
        let requested = src.data_type();
        if declared != requested {
            return Err(SndaError::TypeMismatch {
                declared,
                requested,
            });
        }
        let oob = || SndaError::Storage(format!("row {index} out of bounds"));
        match (self, src) {
            (ColumnData::Int8(a), ColumnData::Int8(b)) => a.push(*b.get(index).ok_or_else(oob)?),
            (ColumnData::Int16(a), ColumnData::Int16(b)) => a.push(*b.get(index).ok_or_else(oob)?),
            (ColumnData::Int32(a), ColumnData::Int32(b)) => a.push(*b.get(index).ok_or_else(oob)?),
            (ColumnData::Int64(a), ColumnData::Int64(b)) => a.push(*b.get(index).ok_or_else(oob)?),
            (ColumnData::UInt8(a), ColumnData::UInt8(b)) => a.push(*b.get(index).ok_or_else(oob)?),
            (ColumnData::UInt16(a), ColumnData::UInt16(b)) => {
                a.push(*b.get(index).ok_or_else(oob)?)
            }
            (ColumnData::UInt32(a), ColumnData::UInt32(b)) => {
                a.push(*b.get(index).ok_or_else(oob)?)
            }
            (ColumnData::UInt64(a), ColumnData::UInt64(b)) => {
                a.push(*b.get(index).ok_or_else(oob)?)
            }
            (ColumnData::Float32(a), ColumnData::Float32(b)) => {
                a.push(*b.get(index).ok_or_else(oob)?)
            }
            (ColumnData::Float64(a), ColumnData::Float64(b)) => {
                a.push(*b.get(index).ok_or_else(oob)?)
            }
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.push(*b.get(index).ok_or_else(oob)?),
            (ColumnData::Str(a), ColumnData::Str(b)) => {
                a.push(b.get(index).ok_or_else(oob)?.clone())
            }
            _ => unreachable!("tags already checked equal"),
        }
        Ok(())
    }

    /// Copy of the values in `range`
    pub fn slice(&self, range: core::ops::Range<usize>) -> Self {
        per_variant!(self, v => {
            let end = range.end.min(v.len());
            let start = range.start.min(end);
            let out = v[start..end].to_vec();
            out.into()
        })
    }

    /// Move all values of `other` onto the end of `self`; fails on a
    /// type disagreement
    pub fn append(&mut self, other: &mut Self) -> Result<()> {
        let declared = self.data_type();
        let requested = other.data_type();
        if declared != requested {
            return Err(SndaError::TypeMismatch {
                declared,
                requested,
            });
        }
        match (self, other) {
            (ColumnData::Int8(a), ColumnData::Int8(b)) => a.append(b),
            (ColumnData::Int16(a), ColumnData::Int16(b)) => a.append(b),
            (ColumnData::Int32(a), ColumnData::Int32(b)) => a.append(b),
            (ColumnData::Int64(a), ColumnData::Int64(b)) => a.append(b),
            (ColumnData::UInt8(a), ColumnData::UInt8(b)) => a.append(b),
            (ColumnData::UInt16(a), ColumnData::UInt16(b)) => a.append(b),
            (ColumnData::UInt32(a), ColumnData::UInt32(b)) => a.append(b),
            (ColumnData::UInt64(a), ColumnData::UInt64(b)) => a.append(b),
            (ColumnData::Float32(a), ColumnData::Float32(b)) => a.append(b),
            (ColumnData::Float64(a), ColumnData::Float64(b)) => a.append(b),
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.append(b),
            (ColumnData::Str(a), ColumnData::Str(b)) => a.append(b),
            _ => unreachable!("tags already checked equal"),
        }
        Ok(())
    }
}

macro_rules! impl_from_vec {
    ($rust:ty, $tag:ident) => {
        impl From<Vec<$rust>> for ColumnData {
            fn from(values: Vec<$rust>) -> Self {
                ColumnData::$tag(values)
            }
        }
    };
}

impl_from_vec!(i8, Int8);
impl_from_vec!(i16, Int16);
impl_from_vec!(i32, Int32);
impl_from_vec!(i64, Int64);
impl_from_vec!(u8, UInt8);
impl_from_vec!(u16, UInt16);
impl_from_vec!(u32, UInt32);
impl_from_vec!(u64, UInt64);
impl_from_vec!(f32, Float32);
impl_from_vec!(f64, Float64);
impl_from_vec!(bool, Bool);
impl_from_vec!(String, Str);

/// One named column of exchanged data
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnBuffer {
    name: String,
    data: ColumnData,
}

impl ColumnBuffer {
    /// Wrap typed data under a column name
    pub fn new(name: &str, data: impl Into<ColumnData>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Datatype tag of the stored values
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Number of values in the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the buffer holds no values
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The typed storage
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Mutable typed storage
    pub fn data_mut(&mut self) -> &mut ColumnData {
        &mut self.data
    }

    /// Typed values, if the column holds `T`
    pub fn as_slice<T>(&self) -> Option<&[T]>
    where
        for<'a> &'a ColumnData: TryInto<&'a [T]>,
    {
        (&self.data).try_into().ok()
    }
}

macro_rules! impl_try_as_slice {
    ($rust:ty, $tag:ident, $dtype:ident) => {
        impl<'a> TryFrom<&'a ColumnData> for &'a [$rust] {
            type Error = SndaError;

            fn try_from(data: &'a ColumnData) -> Result<&'a [$rust]> {
                match data {
                    ColumnData::$tag(v) => Ok(v.as_slice()),
                    other => Err(SndaError::TypeMismatch {
                        declared: other.data_type(),
                        requested: DataType::$dtype,
                    }),
                }
            }
        }
    };
}

impl_try_as_slice!(i8, Int8, Int8);
impl_try_as_slice!(i16, Int16, Int16);
impl_try_as_slice!(i32, Int32, Int32);
impl_try_as_slice!(i64, Int64, Int64);
impl_try_as_slice!(u8, UInt8, UInt8);
impl_try_as_slice!(u16, UInt16, UInt16);
impl_try_as_slice!(u32, UInt32, UInt32);
impl_try_as_slice!(u64, UInt64, UInt64);
impl_try_as_slice!(f32, Float32, Float32);
impl_try_as_slice!(f64, Float64, Float64);
impl_try_as_slice!(bool, Bool, Bool);
impl_try_as_slice!(String, Str, StringUtf8);

/// Ordered set of column buffers exchanged on read and write
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayBuffers {
    // Column names in insertion order
    names: Vec<String>,
    buffers: HashMap<String, ColumnBuffer>,
}

impl ArrayBuffers {
    /// Empty buffer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the buffer with the given name
    pub fn at(&self, name: &str) -> Result<&ColumnBuffer> {
        self.buffers
            .get(name)
            .ok_or_else(|| SndaError::Schema(format!("buffer column '{name}' does not exist")))
    }

    /// True if a buffer with the given name exists
    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    /// Add a column buffer, maintaining insertion order; fails if the
    /// name already exists
    pub fn emplace(&mut self, buffer: ColumnBuffer) -> Result<()> {
        let name = buffer.name().to_string();
        if self.contains(&name) {
            return Err(SndaError::Schema(format!(
                "buffer column '{name}' already exists"
            )));
        }
        self.names.push(name.clone());
        self.buffers.insert(name, buffer);
        Ok(())
    }

    /// Ordered column names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows, taken from the first column
    pub fn num_rows(&self) -> usize {
        self.names
            .first()
            .and_then(|n| self.buffers.get(n))
            .map_or(0, |b| b.len())
    }

    /// True if there are no rows (or no columns)
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Copy of the same columns restricted to the row `range`
    pub fn slice(&self, range: core::ops::Range<usize>) -> Self {
        let mut out = Self::new();
        for name in &self.names {
            let buf = &self.buffers[name];
            let sliced = ColumnBuffer {
                name: name.clone(),
                data: buf.data.slice(range.clone()),
            };
            // Names are already unique here
            out.names.push(name.clone());
            out.buffers.insert(name.clone(), sliced);
        }
        out
    }

    /// Concatenate another chunk with the same column layout onto `self`
    pub fn append(&mut self, mut other: ArrayBuffers) -> Result<()> {
        if self.names.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.names != other.names {
            return Err(SndaError::Schema(
                "cannot append buffers with a different column set".into(),
            ));
        }
        for name in &self.names {
            let src = other
                .buffers
                .get_mut(name)
                .ok_or_else(|| SndaError::Schema(format!("buffer column '{name}' missing")))?;
            self.buffers
                .get_mut(name)
                .ok_or_else(|| SndaError::Schema(format!("buffer column '{name}' missing")))?
                .data
                .append(&mut src.data)?;
        }
        Ok(())
    }
}
