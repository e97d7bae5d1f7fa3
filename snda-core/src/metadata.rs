//! Typed key/value metadata entries
//!
//! A metadata value is a possibly multi-valued binary blob tagged with the
//! datatype of its elements. Keys are UTF-8 strings, unique per array.
//! Encoding to and from typed slices goes through `bytemuck` casts.

use bytemuck::Pod;

use crate::datatype::DataType;
use crate::error::{Result, SndaError};
use crate::traits::DimensionType;

/// One metadata value: datatype tag, element count, binary payload
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataValue {
    value_type: DataType,
    value_num: u32,
    value: Vec<u8>,
}

impl MetadataValue {
    /// Build a value from raw parts, checking the payload length against
    /// the declared type and count
    pub fn from_parts(value_type: DataType, value_num: u32, value: Vec<u8>) -> Result<Self> {
        if let Some(elem_size) = value_type.size_bytes() {
            let expected = elem_size * value_num as usize;
            if value.len() != expected {
                return Err(SndaError::Schema(format!(
                    "metadata payload is {} bytes, expected {} for {} x {}",
                    value.len(),
                    expected,
                    value_num,
                    value_type
                )));
            }
        }
        Ok(Self {
            value_type,
            value_num,
            value,
        })
    }

    /// Encode a slice of fixed-size values
    pub fn from_values<T: DimensionType + Pod>(values: &[T]) -> Self {
        Self {
            value_type: T::data_type(),
            value_num: values.len() as u32,
            value: bytemuck::cast_slice(values).to_vec(),
        }
    }

    /// Encode a UTF-8 string; the count is the byte length
    pub fn from_str(value: &str) -> Self {
        Self {
            value_type: DataType::StringUtf8,
            value_num: value.len() as u32,
            value: value.as_bytes().to_vec(),
        }
    }

    /// Datatype tag of the payload elements
    pub fn value_type(&self) -> DataType {
        self.value_type
    }

    /// Number of homogeneous elements in the payload
    pub fn value_num(&self) -> u32 {
        self.value_num
    }

    /// Raw binary payload
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Decode the payload as a slice of `T`; fails if `T` disagrees with
    /// the stored tag
    pub fn as_values<T: DimensionType + Pod>(&self) -> Result<Vec<T>> {
        if self.value_type != T::data_type() {
            return Err(SndaError::TypeMismatch {
                declared: self.value_type,
                requested: T::data_type(),
            });
        }
        bytemuck::try_cast_slice(&self.value)
            .map(|s: &[T]| s.to_vec())
            .map_err(|e| SndaError::Storage(format!("metadata payload cast failed: {e}")))
    }

    /// Decode the payload as UTF-8; fails if the tag is not a string
    pub fn as_str(&self) -> Result<&str> {
        if self.value_type != DataType::StringUtf8 {
            return Err(SndaError::TypeMismatch {
                declared: self.value_type,
                requested: DataType::StringUtf8,
            });
        }
        core::str::from_utf8(&self.value)
            .map_err(|e| SndaError::Storage(format!("metadata payload is not UTF-8: {e}")))
    }
}
