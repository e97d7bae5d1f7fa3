//! In-memory reference engine
//!
//! A small MVCC engine for `mem://` URIs. Committed state is a list of
//! timestamp-stamped fragments per array; a write session stages fragments
//! and metadata operations in its open resource and commits them
//! atomically at close; a read session snapshots the fragments visible in
//! its timestamp range when it opens. Duplicate coordinates resolve to the
//! latest-timestamped fragment, whatever order the commits arrived in.
//!
//! This engine exists to exercise the access-pattern contract; it makes no
//! attempt at durability or tiling.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;
use snda_core::{
    ArrayBuffers, ColumnBuffer, ColumnData, DimensionValue, MetadataValue, OpenMode, Result,
    ResultOrder, Schema, SndaError, TimestampRange,
};
use tracing::{debug, trace};

use crate::config::Config;
use crate::engine::{EngineArray, QuerySelector, QueryStream, StorageEngine};

/// One committed write set
struct Fragment {
    timestamp: u64,
    cells: ArrayBuffers,
}

/// Committed state of one array
struct StoredArray {
    schema: Schema,
    fragments: Vec<Arc<Fragment>>,
    metadata: BTreeMap<String, MetadataValue>,
    // Logical write clock; advances at each write-session commit
    clock: u64,
}

/// In-memory storage engine
#[derive(Clone, Default)]
pub struct MemEngine {
    arrays: Arc<Mutex<HashMap<String, Arc<Mutex<StoredArray>>>>>,
}

impl MemEngine {
    /// Fresh engine with no arrays
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<Mutex<StoredArray>>>>> {
        self.arrays
            .lock()
            .map_err(|_| SndaError::Storage("engine registry lock poisoned".into()))
    }
}

fn lock_stored(stored: &Arc<Mutex<StoredArray>>) -> Result<MutexGuard<'_, StoredArray>> {
    stored
        .lock()
        .map_err(|_| SndaError::Storage("array state lock poisoned".into()))
}

impl StorageEngine for MemEngine {
    fn exists(&self, uri: &str) -> Result<bool> {
        Ok(self.registry()?.contains_key(uri))
    }

    fn create(&self, uri: &str, schema: &Schema, _config: &Config) -> Result<()> {
        let mut registry = self.registry()?;
        if registry.contains_key(uri) {
            return Err(SndaError::AlreadyExists(uri.into()));
        }
        debug!(uri, ndim = schema.ndim(), "creating array");
        registry.insert(
            uri.to_string(),
            Arc::new(Mutex::new(StoredArray {
                schema: schema.clone(),
                fragments: Vec::new(),
                metadata: BTreeMap::new(),
                clock: 0,
            })),
        );
        Ok(())
    }

    fn open(
        &self,
        uri: &str,
        mode: OpenMode,
        _config: &Config,
        timestamp: Option<TimestampRange>,
    ) -> Result<Box<dyn EngineArray>> {
        let stored = self
            .registry()?
            .get(uri)
            .cloned()
            .ok_or_else(|| SndaError::NotFound(uri.into()))?;
        let guard = lock_stored(&stored)?;
        let schema = guard.schema.clone();
        // Reads see the fragments in their timestamp range as of open;
        // writes see everything committed so far.
        let snapshot: Vec<Arc<Fragment>> = match (mode, timestamp) {
            (OpenMode::Read, Some(range)) => guard
                .fragments
                .iter()
                .filter(|f| range.contains(f.timestamp))
                .cloned()
                .collect(),
            _ => guard.fragments.clone(),
        };
        let meta_snapshot = guard.metadata.clone();
        drop(guard);
        debug!(uri, mode = %mode, fragments = snapshot.len(), "opened array");
        Ok(Box::new(MemArray {
            stored,
            uri: uri.to_string(),
            mode,
            timestamp,
            schema,
            snapshot,
            meta_snapshot,
            staged_fragments: Vec::new(),
            staged_meta: Vec::new(),
            closed: false,
        }))
    }

    fn delete(&self, uri: &str) -> Result<()> {
        self.registry()?
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| SndaError::NotFound(uri.into()))
    }
}

enum MetaOp {
    Set(String, MetadataValue),
    Delete(String),
}

/// One open session against a stored array
struct MemArray {
    stored: Arc<Mutex<StoredArray>>,
    uri: String,
    mode: OpenMode,
    timestamp: Option<TimestampRange>,
    schema: Schema,
    snapshot: Vec<Arc<Fragment>>,
    meta_snapshot: BTreeMap<String, MetadataValue>,
    staged_fragments: Vec<ArrayBuffers>,
    staged_meta: Vec<MetaOp>,
    closed: bool,
}

/// Engine-internal identity of a coordinate tuple, used for duplicate
/// resolution. Bit-level for floats.
fn coord_key(coords: &[DimensionValue]) -> Vec<u8> {
    let mut key = Vec::new();
    for value in coords {
        match value {
            DimensionValue::Int8(v) => {
                key.push(0);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::Int16(v) => {
                key.push(1);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::Int32(v) => {
                key.push(2);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::Int64(v) => {
                key.push(3);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::UInt8(v) => {
                key.push(4);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::UInt16(v) => {
                key.push(5);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::UInt32(v) => {
                key.push(6);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::UInt64(v) => {
                key.push(7);
                key.extend(v.to_le_bytes());
            }
            DimensionValue::Float32(v) => {
                key.push(8);
                key.extend(v.to_bits().to_le_bytes());
            }
            DimensionValue::Float64(v) => {
                key.push(9);
                key.extend(v.to_bits().to_le_bytes());
            }
            DimensionValue::Str(v) => {
                key.push(10);
                key.extend((v.len() as u64).to_le_bytes());
                key.extend(v.as_bytes());
            }
        }
    }
    key
}

/// A matching cell: which fragment and row it lives in, plus its coords
struct MatchedRow {
    frag: usize,
    row: usize,
    coords: Vec<DimensionValue>,
}

fn cmp_coords(a: &[DimensionValue], b: &[DimensionValue], reversed: bool) -> core::cmp::Ordering {
    let pairs: Vec<(&DimensionValue, &DimensionValue)> = if reversed {
        a.iter().rev().zip(b.iter().rev()).collect()
    } else {
        a.iter().zip(b.iter()).collect()
    };
    for (x, y) in pairs {
        match x.cmp_same_type(y) {
            Some(core::cmp::Ordering::Equal) | None => continue,
            Some(order) => return order,
        }
    }
    core::cmp::Ordering::Equal
}

impl MemArray {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(SndaError::NotOpen);
        }
        Ok(())
    }

    /// Latest-wins cell resolution over the visible fragments, filtered by
    /// the selector. Fragments are visited in ascending timestamp order so
    /// the latest-timestamped write wins regardless of commit order; ties
    /// resolve by commit order.
    fn matched_rows(&self, selector: &QuerySelector) -> Result<Vec<MatchedRow>> {
        let dim_names = self.schema.dim_names();
        let mut visit: Vec<usize> = (0..self.snapshot.len()).collect();
        visit.sort_by_key(|i| self.snapshot[*i].timestamp);
        let mut latest: HashMap<Vec<u8>, MatchedRow> = HashMap::new();
        for frag_idx in visit {
            let fragment = &self.snapshot[frag_idx];
            let dim_columns: Vec<&ColumnBuffer> = dim_names
                .iter()
                .map(|name| fragment.cells.at(name))
                .collect::<Result<_>>()?;
            for row in 0..fragment.cells.num_rows() {
                let mut coords = Vec::with_capacity(dim_columns.len());
                let mut selected = true;
                for (dim_name, column) in dim_names.iter().zip(&dim_columns) {
                    let value = column.data().value_at(row).ok_or_else(|| {
                        SndaError::Storage(format!("fragment row {row} missing coordinate"))
                    })?;
                    if let Some(selection) = selector.get(dim_name) {
                        if !selection.matches(&value) {
                            selected = false;
                            break;
                        }
                    }
                    coords.push(value);
                }
                if !selected {
                    continue;
                }
                latest.insert(
                    coord_key(&coords),
                    MatchedRow {
                        frag: frag_idx,
                        row,
                        coords,
                    },
                );
            }
        }
        Ok(latest.into_values().collect())
    }

    fn merged_metadata(&self) -> BTreeMap<String, MetadataValue> {
        let mut map = self.meta_snapshot.clone();
        for op in &self.staged_meta {
            match op {
                MetaOp::Set(key, value) => {
                    map.insert(key.clone(), value.clone());
                }
                MetaOp::Delete(key) => {
                    map.remove(key);
                }
            }
        }
        map
    }
}

impl EngineArray for MemArray {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn non_empty_domain(&self, dim: &str) -> Result<Option<(DimensionValue, DimensionValue)>> {
        self.check_open()?;
        let column = self.schema.require_column(dim)?;
        if !column.is_index {
            return Err(SndaError::Schema(format!(
                "column '{dim}' is not an index column"
            )));
        }
        let mut bounds: Option<(DimensionValue, DimensionValue)> = None;
        for fragment in &self.snapshot {
            let data = fragment.cells.at(dim)?.data();
            for row in 0..data.len() {
                let value = data
                    .value_at(row)
                    .ok_or_else(|| SndaError::Storage(format!("row {row} missing coordinate")))?;
                bounds = Some(match bounds.take() {
                    None => (value.clone(), value),
                    Some((lo, hi)) => {
                        let lo = if value.cmp_same_type(&lo) == Some(core::cmp::Ordering::Less) {
                            value.clone()
                        } else {
                            lo
                        };
                        let hi = if value.cmp_same_type(&hi) == Some(core::cmp::Ordering::Greater)
                        {
                            value
                        } else {
                            hi
                        };
                        (lo, hi)
                    }
                });
            }
        }
        Ok(bounds)
    }

    fn nnz(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.matched_rows(&QuerySelector::new())?.len() as u64)
    }

    fn fragment_count(&self) -> Result<usize> {
        self.check_open()?;
        Ok(self.snapshot.len())
    }

    fn submit_query(
        &self,
        selector: &QuerySelector,
        order: ResultOrder,
        columns: &[String],
    ) -> Result<Box<dyn QueryStream>> {
        self.check_open()?;
        let mut rows = self.matched_rows(selector)?;
        // Automatic order is row-major here; only the set is contractual
        let reversed = matches!(order, ResultOrder::ColMajor);
        rows.sort_by(|a, b| cmp_coords(&a.coords, &b.coords, reversed));

        let mut result = ArrayBuffers::new();
        for name in columns {
            let spec = self.schema.require_column(name)?;
            let mut data = ColumnData::new(spec.dtype);
            for matched in &rows {
                let source = self.snapshot[matched.frag].cells.at(name)?.data();
                data.push_from(source, matched.row)?;
            }
            result.emplace(ColumnBuffer::new(name, data))?;
        }
        trace!(uri = %self.uri, rows = result.num_rows(), "query materialized");
        Ok(Box::new(MemQueryStream {
            result,
            cursor: 0,
            done: false,
        }))
    }

    fn write(&mut self, buffers: &ArrayBuffers) -> Result<()> {
        self.check_open()?;
        if self.mode != OpenMode::Write {
            return Err(SndaError::Mode {
                op: "write",
                mode: self.mode.as_str(),
            });
        }
        trace!(uri = %self.uri, rows = buffers.num_rows(), "staging write");
        self.staged_fragments.push(buffers.clone());
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<MetadataValue>> {
        self.check_open()?;
        Ok(self.merged_metadata().remove(key))
    }

    fn get_metadata_all(&self) -> Result<BTreeMap<String, MetadataValue>> {
        self.check_open()?;
        Ok(self.merged_metadata())
    }

    fn set_metadata(&mut self, key: &str, value: MetadataValue) -> Result<()> {
        self.check_open()?;
        if self.mode != OpenMode::Write {
            return Err(SndaError::Mode {
                op: "set_metadata",
                mode: self.mode.as_str(),
            });
        }
        self.staged_meta.push(MetaOp::Set(key.to_string(), value));
        Ok(())
    }

    fn delete_metadata(&mut self, key: &str) -> Result<()> {
        self.check_open()?;
        if self.mode != OpenMode::Write {
            return Err(SndaError::Mode {
                op: "delete_metadata",
                mode: self.mode.as_str(),
            });
        }
        // Deleting an absent key is deliberately a no-op
        self.staged_meta.push(MetaOp::Delete(key.to_string()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.mode != OpenMode::Write {
            return Ok(());
        }
        let mut stored = lock_stored(&self.stored)?;
        let ts = self
            .timestamp
            .map(|range| range.start)
            .unwrap_or(stored.clock + 1);
        stored.clock = stored.clock.max(ts);
        let fragments = std::mem::take(&mut self.staged_fragments);
        debug!(
            uri = %self.uri,
            timestamp = ts,
            fragments = fragments.len(),
            "committing write session"
        );
        for cells in fragments {
            stored.fragments.push(Arc::new(Fragment {
                timestamp: ts,
                cells,
            }));
        }
        for op in std::mem::take(&mut self.staged_meta) {
            match op {
                MetaOp::Set(key, value) => {
                    stored.metadata.insert(key, value);
                }
                MetaOp::Delete(key) => {
                    stored.metadata.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Pull-based chunk iterator over a materialized result
struct MemQueryStream {
    result: ArrayBuffers,
    cursor: usize,
    done: bool,
}

impl QueryStream for MemQueryStream {
    fn next_chunk(&mut self, max_cells: usize) -> Result<Option<ArrayBuffers>> {
        if self.done {
            return Ok(None);
        }
        let total = self.result.num_rows();
        let end = (self.cursor + max_cells.max(1)).min(total);
        let chunk = self.result.slice(self.cursor..end);
        self.cursor = end;
        if self.cursor >= total {
            self.done = true;
        }
        Ok(Some(chunk))
    }

    fn is_exhausted(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snda_core::{DataType, SchemaBuilder};

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .index_column(
                "dim0",
                DataType::Int64,
                (DimensionValue::Int64(0), DimensionValue::Int64(99)),
            )
            .attr_column("attr0", DataType::Float32)
            .build()
            .unwrap()
    }

    fn buffers(dims: Vec<i64>, attrs: Vec<f32>) -> ArrayBuffers {
        let mut bufs = ArrayBuffers::new();
        bufs.emplace(ColumnBuffer::new("dim0", dims)).unwrap();
        bufs.emplace(ColumnBuffer::new("attr0", attrs)).unwrap();
        bufs
    }

    #[test]
    fn test_create_then_exists() {
        let engine = MemEngine::new();
        let cfg = Config::new();
        assert!(!engine.exists("mem://a").unwrap());
        engine.create("mem://a", &test_schema(), &cfg).unwrap();
        assert!(engine.exists("mem://a").unwrap());
        assert!(matches!(
            engine.create("mem://a", &test_schema(), &cfg),
            Err(SndaError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_delete_removes_array() {
        let engine = MemEngine::new();
        let cfg = Config::new();
        engine.create("mem://a", &test_schema(), &cfg).unwrap();
        engine.delete("mem://a").unwrap();
        assert!(!engine.exists("mem://a").unwrap());
        assert!(matches!(
            engine.delete("mem://a"),
            Err(SndaError::NotFound(_))
        ));
    }

    #[test]
    fn test_open_missing_fails() {
        let engine = MemEngine::new();
        assert!(matches!(
            engine.open("mem://missing", OpenMode::Read, &Config::new(), None),
            Err(SndaError::NotFound(_))
        ));
    }

    #[test]
    fn test_writes_invisible_until_close() {
        let engine = MemEngine::new();
        let cfg = Config::new();
        engine.create("mem://a", &test_schema(), &cfg).unwrap();

        let mut writer = engine
            .open("mem://a", OpenMode::Write, &cfg, None)
            .unwrap();
        writer.write(&buffers(vec![1, 2], vec![1.0, 2.0])).unwrap();

        // A reader opened before the commit sees nothing
        let reader = engine.open("mem://a", OpenMode::Read, &cfg, None).unwrap();
        assert_eq!(reader.nnz().unwrap(), 0);

        writer.close().unwrap();

        // A reader opened after the commit sees both cells
        let reader = engine.open("mem://a", OpenMode::Read, &cfg, None).unwrap();
        assert_eq!(reader.nnz().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_coordinates_latest_wins() {
        let engine = MemEngine::new();
        let cfg = Config::new();
        engine.create("mem://a", &test_schema(), &cfg).unwrap();

        let mut writer = engine
            .open("mem://a", OpenMode::Write, &cfg, None)
            .unwrap();
        writer.write(&buffers(vec![5], vec![1.0])).unwrap();
        writer.close().unwrap();

        let mut writer = engine
            .open("mem://a", OpenMode::Write, &cfg, None)
            .unwrap();
        writer.write(&buffers(vec![5], vec![9.0])).unwrap();
        writer.close().unwrap();

        let reader = engine.open("mem://a", OpenMode::Read, &cfg, None).unwrap();
        assert_eq!(reader.nnz().unwrap(), 1);
        let columns = vec!["dim0".to_string(), "attr0".to_string()];
        let mut stream = reader
            .submit_query(&QuerySelector::new(), ResultOrder::RowMajor, &columns)
            .unwrap();
        let chunk = stream.next_chunk(16).unwrap().unwrap();
        let attrs: &[f32] = chunk.at("attr0").unwrap().as_slice().unwrap();
        assert_eq!(attrs, &[9.0]);
    }

    #[test]
    fn test_duplicate_resolution_follows_timestamps() {
        let engine = MemEngine::new();
        let cfg = Config::new();
        engine.create("mem://a", &test_schema(), &cfg).unwrap();

        // The later-stamped write commits first
        for (ts, attr) in [(20, 1.0f32), (10, 9.0)] {
            let mut writer = engine
                .open("mem://a", OpenMode::Write, &cfg, Some(TimestampRange::at(ts)))
                .unwrap();
            writer.write(&buffers(vec![5], vec![attr])).unwrap();
            writer.close().unwrap();
        }

        let reader = engine.open("mem://a", OpenMode::Read, &cfg, None).unwrap();
        assert_eq!(reader.nnz().unwrap(), 1);
        let columns = vec!["dim0".to_string(), "attr0".to_string()];
        let mut stream = reader
            .submit_query(&QuerySelector::new(), ResultOrder::RowMajor, &columns)
            .unwrap();
        let chunk = stream.next_chunk(16).unwrap().unwrap();
        let attrs: &[f32] = chunk.at("attr0").unwrap().as_slice().unwrap();
        // ts=20 wins even though it was committed before ts=10
        assert_eq!(attrs, &[1.0]);
    }

    #[test]
    fn test_timestamp_snapshot() {
        let engine = MemEngine::new();
        let cfg = Config::new();
        engine.create("mem://a", &test_schema(), &cfg).unwrap();

        for (ts, dim) in [(10, 1i64), (20, 2i64)] {
            let mut writer = engine
                .open("mem://a", OpenMode::Write, &cfg, Some(TimestampRange::at(ts)))
                .unwrap();
            writer.write(&buffers(vec![dim], vec![dim as f32])).unwrap();
            writer.close().unwrap();
        }

        // Full history
        let reader = engine.open("mem://a", OpenMode::Read, &cfg, None).unwrap();
        assert_eq!(reader.nnz().unwrap(), 2);

        // Only the first write
        let reader = engine
            .open(
                "mem://a",
                OpenMode::Read,
                &cfg,
                Some(TimestampRange::new(0, 15)),
            )
            .unwrap();
        assert_eq!(reader.nnz().unwrap(), 1);
        assert_eq!(
            reader.non_empty_domain("dim0").unwrap(),
            Some((DimensionValue::Int64(1), DimensionValue::Int64(1)))
        );
    }

    #[test]
    fn test_col_major_order() {
        let schema = SchemaBuilder::new()
            .index_column(
                "d0",
                DataType::Int64,
                (DimensionValue::Int64(0), DimensionValue::Int64(9)),
            )
            .index_column(
                "d1",
                DataType::Int64,
                (DimensionValue::Int64(0), DimensionValue::Int64(9)),
            )
            .build()
            .unwrap();
        let engine = MemEngine::new();
        let cfg = Config::new();
        engine.create("mem://g", &schema, &cfg).unwrap();
        let mut writer = engine
            .open("mem://g", OpenMode::Write, &cfg, None)
            .unwrap();
        let mut cells = ArrayBuffers::new();
        cells
            .emplace(ColumnBuffer::new("d0", vec![0i64, 0, 1, 1]))
            .unwrap();
        cells
            .emplace(ColumnBuffer::new("d1", vec![0i64, 1, 0, 1]))
            .unwrap();
        writer.write(&cells).unwrap();
        writer.close().unwrap();

        let reader = engine.open("mem://g", OpenMode::Read, &cfg, None).unwrap();
        let columns = vec!["d0".to_string(), "d1".to_string()];
        let mut stream = reader
            .submit_query(&QuerySelector::new(), ResultOrder::ColMajor, &columns)
            .unwrap();
        let chunk = stream.next_chunk(16).unwrap().unwrap();
        let d0: &[i64] = chunk.at("d0").unwrap().as_slice().unwrap();
        let d1: &[i64] = chunk.at("d1").unwrap().as_slice().unwrap();
        // Last dimension most significant
        assert_eq!(d1, &[0, 0, 1, 1]);
        assert_eq!(d0, &[0, 1, 0, 1]);
    }

    #[test]
    fn test_empty_stream_yields_one_empty_chunk() {
        let engine = MemEngine::new();
        let cfg = Config::new();
        engine.create("mem://a", &test_schema(), &cfg).unwrap();
        let reader = engine.open("mem://a", OpenMode::Read, &cfg, None).unwrap();
        let columns = vec!["dim0".to_string(), "attr0".to_string()];
        let mut stream = reader
            .submit_query(&QuerySelector::new(), ResultOrder::Automatic, &columns)
            .unwrap();
        let chunk = stream.next_chunk(16).unwrap().unwrap();
        assert_eq!(chunk.num_rows(), 0);
        assert!(stream.is_exhausted());
        assert!(stream.next_chunk(16).unwrap().is_none());
    }
}
