//! Storage engine boundary
//!
//! These traits define everything this layer asks of the underlying
//! chunked columnar storage engine: transactional array open/close,
//! domain queries, streamed buffer reads, staged writes, and string-keyed
//! metadata. They are pure interfaces; the in-memory reference engine in
//! [`crate::mem`] is one implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use snda_core::{
    ArrayBuffers, DimensionValue, MetadataValue, OpenMode, Result, ResultOrder, Schema,
    TimestampRange,
};

use crate::config::Config;

/// Per-dimension query region: discrete points and inclusive ranges.
///
/// An empty selection means the full domain of that dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimSelection {
    /// Discrete coordinates to match
    pub points: Vec<DimensionValue>,
    /// Inclusive `[lower, upper]` ranges to match
    pub ranges: Vec<(DimensionValue, DimensionValue)>,
    /// Set when a partition resolved to an empty slice. The constraint is
    /// the union of all contributions, so an empty contribution with no
    /// points or ranges matches nothing rather than falling back to
    /// full-domain.
    pub empty_partition: bool,
}

impl DimSelection {
    /// True if no constraint was contributed (full-domain)
    pub fn is_unconstrained(&self) -> bool {
        self.points.is_empty() && self.ranges.is_empty() && !self.empty_partition
    }

    /// True if `value` is one of the points or inside one of the ranges
    pub fn matches(&self, value: &DimensionValue) -> bool {
        if self.is_unconstrained() {
            return true;
        }
        let on_point = self
            .points
            .iter()
            .any(|p| value.cmp_same_type(p) == Some(core::cmp::Ordering::Equal));
        let in_range = self
            .ranges
            .iter()
            .any(|(lo, hi)| value.in_range(lo, hi).unwrap_or(false));
        on_point || in_range
    }
}

/// Multi-dimensional query region, keyed by dimension name.
///
/// Dimensions without an entry are unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySelector {
    selections: HashMap<String, DimSelection>,
}

impl QuerySelector {
    /// Empty (full-domain) selector
    pub fn new() -> Self {
        Self::default()
    }

    /// The selection for a dimension, creating an empty one as needed
    pub fn entry(&mut self, dim: &str) -> &mut DimSelection {
        self.selections.entry(dim.to_string()).or_default()
    }

    /// The selection for a dimension, if any was set
    pub fn get(&self, dim: &str) -> Option<&DimSelection> {
        self.selections.get(dim)
    }

    /// True if no dimension is constrained
    pub fn is_unconstrained(&self) -> bool {
        self.selections.values().all(DimSelection::is_unconstrained)
    }

    /// Drop all selections
    pub fn clear(&mut self) {
        self.selections.clear();
    }
}

/// A finite, non-restartable pull sequence of buffer chunks.
///
/// Chunk boundaries are capacity artifacts, never logical record
/// boundaries. Restarting a query requires submitting a new stream.
pub trait QueryStream: Send {
    /// Pull the next chunk of at most `max_cells` rows.
    ///
    /// The first pull always yields a chunk, possibly with zero rows;
    /// `None` means the stream was already exhausted by a prior pull.
    fn next_chunk(&mut self, max_cells: usize) -> Result<Option<ArrayBuffers>>;

    /// True once every row has been handed out
    fn is_exhausted(&self) -> bool;
}

/// One opened engine-side array resource.
///
/// The handle layer owns exactly one of these per open session and is
/// responsible for releasing it through [`EngineArray::close`]; for
/// write-mode sessions, `close` is the commit point for staged cell data
/// and metadata.
pub trait EngineArray: Send {
    /// Declared schema of the array
    fn schema(&self) -> &Schema;

    /// Mode this resource was opened in
    fn mode(&self) -> OpenMode;

    /// Tightest occupied `[min, max]` bound of one dimension, or `None`
    /// when the array holds no cells
    fn non_empty_domain(&self, dim: &str) -> Result<Option<(DimensionValue, DimensionValue)>>;

    /// Number of stored non-empty cells visible to this session
    fn nnz(&self) -> Result<u64>;

    /// Number of committed fragments visible to this session
    fn fragment_count(&self) -> Result<usize>;

    /// Start a streamed read of `columns` over the selected region
    fn submit_query(
        &self,
        selector: &QuerySelector,
        order: ResultOrder,
        columns: &[String],
    ) -> Result<Box<dyn QueryStream>>;

    /// Stage a buffer set for commit at close
    fn write(&mut self, buffers: &ArrayBuffers) -> Result<()>;

    /// Look up one metadata entry
    fn get_metadata(&self, key: &str) -> Result<Option<MetadataValue>>;

    /// The full metadata mapping
    fn get_metadata_all(&self) -> Result<BTreeMap<String, MetadataValue>>;

    /// Stage a metadata upsert
    fn set_metadata(&mut self, key: &str, value: MetadataValue) -> Result<()>;

    /// Stage a metadata deletion; absent keys are a no-op
    fn delete_metadata(&mut self, key: &str) -> Result<()>;

    /// Release the resource, committing staged effects. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Factory side of the engine boundary
pub trait StorageEngine: Send + Sync {
    /// True if a valid array is materialized at `uri`
    fn exists(&self, uri: &str) -> Result<bool>;

    /// Durably materialize schema and domain at `uri`
    fn create(&self, uri: &str, schema: &Schema, config: &Config) -> Result<()>;

    /// Acquire an opened array resource
    fn open(
        &self,
        uri: &str,
        mode: OpenMode,
        config: &Config,
        timestamp: Option<TimestampRange>,
    ) -> Result<Box<dyn EngineArray>>;

    /// Remove the array at `uri`
    fn delete(&self, uri: &str) -> Result<()>;
}

/// Engine plus configuration, shared by every handle it opens
#[derive(Clone)]
pub struct Context {
    engine: Arc<dyn StorageEngine>,
    config: Config,
}

impl Context {
    /// Pair an engine with a configuration
    pub fn new(engine: Arc<dyn StorageEngine>, config: Config) -> Self {
        Self { engine, config }
    }

    /// A context over a fresh in-memory engine with default configuration
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::mem::MemEngine::new()), Config::new())
    }

    /// The storage engine
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// The configuration passed through create/open
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
