//! Error types for array access operations

use crate::datatype::DataType;

/// Errors that can occur while creating, opening, querying, or mutating
/// an array.
///
/// Every public operation in this workspace either returns a well-defined
/// result or one of these variants; incomplete reads are signaled through
/// `results_complete()` on the handle, never through an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SndaError {
    /// A valid array is already materialized at the URI
    #[error("array already exists at '{0}'")]
    AlreadyExists(String),
    /// No array exists at the URI
    #[error("no array found at '{0}'")]
    NotFound(String),
    /// Unknown column name, or a value incompatible with the declared schema
    #[error("schema error: {0}")]
    Schema(String),
    /// Operation is illegal for the current open mode
    #[error("operation '{op}' is not legal in {mode} mode")]
    Mode {
        /// Name of the rejected operation
        op: &'static str,
        /// The mode the handle is currently open in
        mode: &'static str,
    },
    /// Operation requires an open handle
    #[error("array is not open")]
    NotOpen,
    /// A typed accessor disagrees with the schema's declared column type
    #[error("type mismatch: column is declared {declared}, requested {requested}")]
    TypeMismatch {
        /// Type declared by the schema
        declared: DataType,
        /// Type requested by the caller
        requested: DataType,
    },
    /// Failure surfaced verbatim from the storage engine
    #[error("storage engine error: {0}")]
    Storage(String),
}

/// Result type for array access operations
pub type Result<T> = std::result::Result<T, SndaError>;
