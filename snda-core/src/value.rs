//! Tagged dimension values
//!
//! A `DimensionValue` is a discriminated union over the primitive types a
//! dimension column may be declared with. It replaces a per-type method
//! surface with one value type plus runtime type checks at the boundary:
//! an operation handed a value whose tag disagrees with the schema fails
//! fast with a type-mismatch error.

use core::cmp::Ordering;

use crate::datatype::DataType;

/// One coordinate value for a single dimension
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DimensionValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Str(String),
}

impl DimensionValue {
    /// The datatype tag carried by this value
    pub fn data_type(&self) -> DataType {
        match self {
            DimensionValue::Int8(_) => DataType::Int8,
            DimensionValue::Int16(_) => DataType::Int16,
            DimensionValue::Int32(_) => DataType::Int32,
            DimensionValue::Int64(_) => DataType::Int64,
            DimensionValue::UInt8(_) => DataType::UInt8,
            DimensionValue::UInt16(_) => DataType::UInt16,
            DimensionValue::UInt32(_) => DataType::UInt32,
            DimensionValue::UInt64(_) => DataType::UInt64,
            DimensionValue::Float32(_) => DataType::Float32,
            DimensionValue::Float64(_) => DataType::Float64,
            DimensionValue::Str(_) => DataType::StringUtf8,
        }
    }

    /// Compare two values of the same tag; `None` if the tags differ.
    ///
    /// Floats compare by total order so that sorting coordinate streams
    /// is well defined even in the presence of NaN.
    pub fn cmp_same_type(&self, other: &DimensionValue) -> Option<Ordering> {
        use DimensionValue::*;
        match (self, other) {
            (Int8(a), Int8(b)) => Some(a.cmp(b)),
            (Int16(a), Int16(b)) => Some(a.cmp(b)),
            (Int32(a), Int32(b)) => Some(a.cmp(b)),
            (Int64(a), Int64(b)) => Some(a.cmp(b)),
            (UInt8(a), UInt8(b)) => Some(a.cmp(b)),
            (UInt16(a), UInt16(b)) => Some(a.cmp(b)),
            (UInt32(a), UInt32(b)) => Some(a.cmp(b)),
            (UInt64(a), UInt64(b)) => Some(a.cmp(b)),
            (Float32(a), Float32(b)) => Some(a.total_cmp(b)),
            (Float64(a), Float64(b)) => Some(a.total_cmp(b)),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// True if `self` lies in the inclusive range `[lower, upper]`.
    /// `None` if any of the three tags disagree.
    pub fn in_range(&self, lower: &DimensionValue, upper: &DimensionValue) -> Option<bool> {
        let ge = self.cmp_same_type(lower)? != Ordering::Less;
        let le = self.cmp_same_type(upper)? != Ordering::Greater;
        Some(ge && le)
    }
}

impl core::fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DimensionValue::Int8(v) => write!(f, "{v}"),
            DimensionValue::Int16(v) => write!(f, "{v}"),
            DimensionValue::Int32(v) => write!(f, "{v}"),
            DimensionValue::Int64(v) => write!(f, "{v}"),
            DimensionValue::UInt8(v) => write!(f, "{v}"),
            DimensionValue::UInt16(v) => write!(f, "{v}"),
            DimensionValue::UInt32(v) => write!(f, "{v}"),
            DimensionValue::UInt64(v) => write!(f, "{v}"),
            DimensionValue::Float32(v) => write!(f, "{v}"),
            DimensionValue::Float64(v) => write!(f, "{v}"),
            DimensionValue::Str(v) => write!(f, "{v}"),
        }
    }
}
