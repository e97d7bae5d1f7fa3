//! Typed N-dimensional array facades
//!
//! [`SparseNDArray`] and [`DenseNDArray`] wrap an [`Array`] handle and
//! tag it with its array kind. They add the shape view derived from the
//! declared integer domains and typed coordinate accessors that convert
//! between plain Rust primitives and the tagged value form, checking the
//! requested type against the schema at the call boundary. Everything
//! else (reads, writes, metadata, lifecycle) passes through to the
//! wrapped handle via `Deref`.

use snda_core::{
    ArrayType, DataType, DimensionType, DimensionValue, OpenMode, Result, ResultOrder, Schema,
    SndaError, TimestampRange,
};

use crate::array::Array;
use crate::engine::Context;

/// Sparse N-dimensional array of a single attribute element type
pub struct SparseNDArray {
    inner: Array,
}

/// Dense N-dimensional array; every cell inside the declared shape holds
/// a value
pub struct DenseNDArray {
    inner: Array,
}

macro_rules! ndarray_facade {
    ($facade:ident, $kind:ident, $sparse:literal) => {
        impl $facade {
            /// Durably materialize a new array at `uri` and return a
            /// Closed facade
            pub fn create(ctx: &Context, uri: &str, schema: &Schema) -> Result<Self> {
                validate_ndarray_schema(schema)?;
                let inner = Array::create(ctx, uri, ArrayType::$kind, schema)?;
                Ok(Self { inner })
            }

            /// Open the array at `uri` with all index columns active,
            /// automatic result order, and the latest snapshot
            pub fn open(ctx: &Context, uri: &str, mode: OpenMode) -> Result<Self> {
                Self::open_with(ctx, uri, mode, &[], ResultOrder::Automatic, None)
            }

            /// Open with an explicit column subset, result order, and
            /// timestamp snapshot
            pub fn open_with(
                ctx: &Context,
                uri: &str,
                mode: OpenMode,
                column_names: &[String],
                result_order: ResultOrder,
                timestamp: Option<TimestampRange>,
            ) -> Result<Self> {
                let inner = Array::open(
                    ctx,
                    uri,
                    ArrayType::$kind,
                    mode,
                    column_names,
                    result_order,
                    timestamp,
                )?;
                Ok(Self { inner })
            }

            /// True if a valid array is materialized at `uri`
            pub fn exists(ctx: &Context, uri: &str) -> Result<bool> {
                Array::exists(ctx, uri)
            }

            /// Whether only occupied cells are stored
            pub fn is_sparse(&self) -> bool {
                $sparse
            }

            /// The array kind label
            pub fn kind(&self) -> &'static str {
                ArrayType::$kind.kind()
            }

            /// Declared capacity along each dimension, in schema order.
            ///
            /// Derived from the integer index-column domains; fails with
            /// a schema error if any dimension is not integer-typed.
            pub fn shape(&self) -> Result<Vec<u64>> {
                shape_of(self.inner.schema()?)
            }

            /// Declared `[lower, upper]` bound of one dimension as `T`
            pub fn domain<T: DimensionType>(&self, dim: &str) -> Result<(T, T)> {
                let (lo, hi) = self.inner.domain(dim)?;
                Ok((T::from_value(&lo)?, T::from_value(&hi)?))
            }

            /// Tightest occupied `[min, max]` bound of one dimension as
            /// `T`, or `None` when the array holds no cells.
            ///
            /// A `T` that disagrees with the declared column type fails
            /// even when the array is empty.
            pub fn non_empty_domain<T: DimensionType>(&self, dim: &str) -> Result<Option<(T, T)>> {
                let declared = self.inner.schema()?.require_column(dim)?.dtype;
                if declared != T::data_type() {
                    return Err(SndaError::TypeMismatch {
                        declared,
                        requested: T::data_type(),
                    });
                }
                match self.inner.non_empty_domain(dim)? {
                    Some((lo, hi)) => Ok(Some((T::from_value(&lo)?, T::from_value(&hi)?))),
                    None => Ok(None),
                }
            }

            /// Constrain `dim` to a single typed coordinate
            pub fn set_dim_point<T: DimensionType>(&mut self, dim: &str, point: T) -> Result<()> {
                self.inner.set_dim_point(dim, point.to_value())
            }

            /// Constrain `dim` to a set of typed coordinates
            pub fn set_dim_points<T: DimensionType>(
                &mut self,
                dim: &str,
                points: &[T],
            ) -> Result<()> {
                let values: Vec<DimensionValue> =
                    points.iter().map(|p| p.to_value()).collect();
                self.inner.set_dim_points(dim, &values)
            }

            /// Constrain `dim` to one partition of a typed coordinate set
            pub fn set_dim_points_partitioned<T: DimensionType>(
                &mut self,
                dim: &str,
                points: &[T],
                partition_index: usize,
                partition_count: usize,
            ) -> Result<()> {
                let values: Vec<DimensionValue> =
                    points.iter().map(|p| p.to_value()).collect();
                self.inner
                    .set_dim_points_partitioned(dim, &values, partition_index, partition_count)
            }

            /// Constrain `dim` to a set of typed inclusive ranges
            pub fn set_dim_ranges<T: DimensionType>(
                &mut self,
                dim: &str,
                ranges: &[(T, T)],
            ) -> Result<()> {
                let values: Vec<(DimensionValue, DimensionValue)> = ranges
                    .iter()
                    .map(|(lo, hi)| (lo.to_value(), hi.to_value()))
                    .collect();
                self.inner.set_dim_ranges(dim, &values)
            }

            /// The wrapped untyped handle
            pub fn handle(&self) -> &Array {
                &self.inner
            }
        }

        impl core::ops::Deref for $facade {
            type Target = Array;

            fn deref(&self) -> &Array {
                &self.inner
            }
        }

        impl core::ops::DerefMut for $facade {
            fn deref_mut(&mut self) -> &mut Array {
                &mut self.inner
            }
        }
    };
}

ndarray_facade!(SparseNDArray, SparseNDArray, true);
ndarray_facade!(DenseNDArray, DenseNDArray, false);

impl SparseNDArray {
    /// Number of stored non-empty cells. Counts cells across committed
    /// fragments, so this can be expensive on large arrays.
    pub fn nnz(&self) -> Result<u64> {
        self.inner.nnz()
    }
}

/// Every index column must carry an integer domain so the shape is
/// well defined.
fn validate_ndarray_schema(schema: &Schema) -> Result<()> {
    for name in schema.dim_names() {
        let col = schema.require_column(&name)?;
        if !is_integer(col.dtype) {
            return Err(SndaError::Schema(format!(
                "ndarray dimension '{name}' must be integer-typed, got {}",
                col.dtype
            )));
        }
    }
    Ok(())
}

fn is_integer(dtype: DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn shape_of(schema: &Schema) -> Result<Vec<u64>> {
    schema
        .dim_names()
        .iter()
        .map(|name| {
            let (lo, hi) = schema.domain(name)?;
            extent(&lo, &hi).ok_or_else(|| {
                SndaError::Schema(format!(
                    "dimension '{name}' has no integer extent"
                ))
            })
        })
        .collect()
}

/// Inclusive extent `hi - lo + 1` of an integer domain
fn extent(lo: &DimensionValue, hi: &DimensionValue) -> Option<u64> {
    use DimensionValue::*;
    let (lo, hi): (i128, i128) = match (lo, hi) {
        (Int8(a), Int8(b)) => (*a as i128, *b as i128),
        (Int16(a), Int16(b)) => (*a as i128, *b as i128),
        (Int32(a), Int32(b)) => (*a as i128, *b as i128),
        (Int64(a), Int64(b)) => (*a as i128, *b as i128),
        (UInt8(a), UInt8(b)) => (*a as i128, *b as i128),
        (UInt16(a), UInt16(b)) => (*a as i128, *b as i128),
        (UInt32(a), UInt32(b)) => (*a as i128, *b as i128),
        (UInt64(a), UInt64(b)) => (*a as i128, *b as i128),
        _ => return None,
    };
    u64::try_from(hi - lo + 1).ok()
}
