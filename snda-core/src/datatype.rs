//! Primitive datatype tags for schema columns and metadata values

/// Datatypes a schema column or metadata value may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DataType {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Int64 = 3,
    UInt8 = 4,
    UInt16 = 5,
    UInt32 = 6,
    UInt64 = 7,
    Float32 = 8,
    Float64 = 9,
    Bool = 10,
    /// Variable-length UTF-8 string
    StringUtf8 = 11,
}

impl DataType {
    /// Size in bytes of one value, or `None` for variable-length types
    pub const fn size_bytes(&self) -> Option<usize> {
        match self {
            DataType::Int8 | DataType::UInt8 | DataType::Bool => Some(1),
            DataType::Int16 | DataType::UInt16 => Some(2),
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => Some(8),
            DataType::StringUtf8 => None,
        }
    }

    /// True for variable-length types, which use the string-domain query form
    pub const fn is_var_sized(&self) -> bool {
        matches!(self, DataType::StringUtf8)
    }

    /// True for types that may be declared as an index (dimension) column
    pub const fn is_indexable(&self) -> bool {
        !matches!(self, DataType::Bool)
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::StringUtf8 => "string",
        };
        write!(f, "{name}")
    }
}
