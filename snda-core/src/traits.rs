//! Dimension type constraints
//!
//! This module defines the trait that constrains which Rust types may be
//! used with the typed dimension accessors (`domain::<T>`,
//! `non_empty_domain::<T>`, `set_dim_point`). Each implementation maps a
//! primitive to its `DataType` tag; the runtime check against the schema's
//! declared column type happens at the call boundary.

use crate::datatype::DataType;
use crate::error::{Result, SndaError};
use crate::value::DimensionValue;

/// Trait for fixed-size types usable as dimension coordinates
pub trait DimensionType: Copy + PartialOrd + Sized {
    /// The datatype tag for this coordinate type
    fn data_type() -> DataType;

    /// Wrap a coordinate in the tagged value form
    fn to_value(self) -> DimensionValue;

    /// Unwrap a tagged value; fails with a type mismatch if the tag
    /// disagrees with `Self::data_type()`
    fn from_value(value: &DimensionValue) -> Result<Self>;
}

macro_rules! impl_dimension_type {
    ($rust:ty, $tag:ident) => {
        impl DimensionType for $rust {
            fn data_type() -> DataType {
                DataType::$tag
            }

            fn to_value(self) -> DimensionValue {
                DimensionValue::$tag(self)
            }

            fn from_value(value: &DimensionValue) -> Result<Self> {
                match value {
                    DimensionValue::$tag(v) => Ok(*v),
                    other => Err(SndaError::TypeMismatch {
                        declared: other.data_type(),
                        requested: DataType::$tag,
                    }),
                }
            }
        }
    };
}

impl_dimension_type!(i8, Int8);
impl_dimension_type!(i16, Int16);
impl_dimension_type!(i32, Int32);
impl_dimension_type!(i64, Int64);
impl_dimension_type!(u8, UInt8);
impl_dimension_type!(u16, UInt16);
impl_dimension_type!(u32, UInt32);
impl_dimension_type!(u64, UInt64);
impl_dimension_type!(f32, Float32);
impl_dimension_type!(f64, Float64);

// Strings are var-sized and go through the separate *_var query forms
// rather than this trait.
