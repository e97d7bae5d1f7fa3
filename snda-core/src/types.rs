//! Lifecycle and query enums shared across the workspace

/// Mode an array handle is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    /// Lowercase name, used in mode-error messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Read => "read",
            OpenMode::Write => "write",
        }
    }
}

impl core::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested iteration order of emitted cells.
///
/// Affects only the sequence of returned cells, never the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResultOrder {
    /// Engine-chosen order; callers must not rely on any particular sequence
    #[default]
    Automatic,
    /// Lexicographic by dimension, first dimension most significant
    RowMajor,
    /// Lexicographic by dimension, last dimension most significant
    ColMajor,
}

/// Concrete kind of an array object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayType {
    SparseNDArray,
    DenseNDArray,
    DataFrame,
}

impl ArrayType {
    /// Fixed literal identifying the kind, exposed upward to binding layers
    pub const fn kind(&self) -> &'static str {
        match self {
            ArrayType::SparseNDArray => "SparseNDArray",
            ArrayType::DenseNDArray => "DenseNDArray",
            ArrayType::DataFrame => "DataFrame",
        }
    }
}

impl core::fmt::Display for ArrayType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Inclusive pair of logical write timestamps.
///
/// Fixes the snapshot a read-mode handle sees, or the write timestamp
/// recorded by a write-mode session. Absent means the engine default:
/// everything for reads, "now" for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimestampRange {
    pub start: u64,
    pub end: u64,
}

impl TimestampRange {
    /// Inclusive range from `start` to `end`
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Range covering a single timestamp
    pub const fn at(ts: u64) -> Self {
        Self { start: ts, end: ts }
    }

    /// True if `ts` falls inside the range
    pub const fn contains(&self, ts: u64) -> bool {
        self.start <= ts && ts <= self.end
    }
}
