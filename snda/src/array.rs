//! Array handle: lifecycle, query construction, chunked reads, writes
//!
//! An [`Array`] owns one engine-side array resource for the duration of an
//! open session, together with the current dimension query state and the
//! streaming read cursor. It is either Closed or Open-in-mode; metadata
//! mutation and `write` require Write mode, `read_next` requires Read
//! mode.
//!
//! A handle is not internally synchronized: one caller thread per handle
//! is the supported contract. Independent handles on the same URI are
//! isolated by the engine's timestamp snapshots.

use std::collections::BTreeMap;

use snda_core::{
    ArrayBuffers, ArrayType, ColumnSpec, DimensionValue, MetadataValue, OpenMode, Result,
    ResultOrder, Schema, SndaError, TimestampRange, partition_slice, validate_range,
};
use tracing::debug;

use crate::engine::{Context, EngineArray, QuerySelector, QueryStream};

/// Read cursor over the current query configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// No read submitted since open/reset
    Fresh,
    /// A stream is active and more chunks may remain
    Incomplete,
    /// The final chunk was returned; sticky until reset
    Complete,
}

struct OpenState {
    resource: Box<dyn EngineArray>,
    mode: OpenMode,
    timestamp: Option<TimestampRange>,
    // Active index-column subset, in schema declaration order
    column_names: Vec<String>,
    result_order: ResultOrder,
    batch_size: usize,
    selector: QuerySelector,
    stream: Option<Box<dyn QueryStream>>,
    cursor: CursorState,
}

/// Handle to one array instance
pub struct Array {
    ctx: Context,
    uri: String,
    array_type: ArrayType,
    state: Option<OpenState>,
}

impl core::fmt::Debug for Array {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Array")
            .field("uri", &self.uri)
            .field("array_type", &self.array_type)
            .field("open", &self.state.is_some())
            .finish_non_exhaustive()
    }
}

impl Array {
    /// Durably materialize schema and domain at `uri` and return a Closed
    /// handle; the caller must `open` before use. Fails if a valid array
    /// already exists there.
    pub fn create(ctx: &Context, uri: &str, array_type: ArrayType, schema: &Schema) -> Result<Self> {
        ctx.engine().create(uri, schema, ctx.config())?;
        debug!(uri, kind = array_type.kind(), "created array");
        Ok(Self {
            ctx: ctx.clone(),
            uri: uri.to_string(),
            array_type,
            state: None,
        })
    }

    /// True if a valid array is materialized at `uri`
    pub fn exists(ctx: &Context, uri: &str) -> Result<bool> {
        ctx.engine().exists(uri)
    }

    /// Open the array at `uri` and return an Open handle with an empty
    /// dimension query state and a fresh cursor.
    ///
    /// `column_names` selects the active index-column subset; an empty
    /// list means all declared index columns. Unknown or non-index names
    /// fail with a schema error.
    pub fn open(
        ctx: &Context,
        uri: &str,
        array_type: ArrayType,
        mode: OpenMode,
        column_names: &[String],
        result_order: ResultOrder,
        timestamp: Option<TimestampRange>,
    ) -> Result<Self> {
        let mut array = Self {
            ctx: ctx.clone(),
            uri: uri.to_string(),
            array_type,
            state: None,
        };
        array.open_with(mode, column_names, result_order, timestamp)?;
        Ok(array)
    }

    /// Transition a Closed handle to Open
    pub fn open_with(
        &mut self,
        mode: OpenMode,
        column_names: &[String],
        result_order: ResultOrder,
        timestamp: Option<TimestampRange>,
    ) -> Result<()> {
        if self.state.is_some() {
            return Err(SndaError::Mode {
                op: "open",
                mode: self.mode().map_or("open", |m| m.as_str()),
            });
        }
        let resource = self
            .ctx
            .engine()
            .open(&self.uri, mode, self.ctx.config(), timestamp)?;
        let active = resolve_index_columns(resource.schema(), column_names)?;
        debug!(uri = %self.uri, mode = %mode, "opened array handle");
        self.state = Some(OpenState {
            resource,
            mode,
            timestamp,
            column_names: active,
            result_order,
            batch_size: self.ctx.config().read_batch_cells(),
            selector: QuerySelector::new(),
            stream: None,
            cursor: CursorState::Fresh,
        });
        Ok(())
    }

    /// Move an open handle to a new mode/snapshot without reconstructing
    /// the dimension-selector state. The current session is closed first
    /// (committing staged writes if it was a Write session); the cursor
    /// resets to Fresh because the new snapshot invalidates any in-flight
    /// stream.
    pub fn reopen(&mut self, mode: OpenMode, timestamp: Option<TimestampRange>) -> Result<()> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        state.stream = None;
        state.resource.close()?;
        let resource = self
            .ctx
            .engine()
            .open(&self.uri, mode, self.ctx.config(), timestamp)?;
        debug!(uri = %self.uri, mode = %mode, "reopened array handle");
        state.resource = resource;
        state.mode = mode;
        state.timestamp = timestamp;
        state.cursor = CursorState::Fresh;
        Ok(())
    }

    /// Release the engine resource, committing staged writes and metadata
    /// of a Write session. Idempotent; after close every operation except
    /// `is_open`/`uri`/`array_type` fails with a not-open error.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut state) = self.state.take() {
            state.stream = None;
            state.resource.close()?;
            debug!(uri = %self.uri, "closed array handle");
        }
        Ok(())
    }

    /// Clear the dimension query state and cursor to prepare a new query
    /// while holding the array open, optionally changing the active
    /// index-column subset, the chunk sizing hint, and the result order.
    ///
    /// A `None` batch hint restores the configured default.
    pub fn reset(
        &mut self,
        column_names: &[String],
        batch_size: Option<usize>,
        result_order: ResultOrder,
    ) -> Result<()> {
        let default_batch = self.ctx.config().read_batch_cells();
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        state.column_names = resolve_index_columns(state.resource.schema(), column_names)?;
        state.result_order = result_order;
        state.batch_size = batch_size.filter(|n| *n > 0).unwrap_or(default_batch);
        state.selector.clear();
        state.stream = None;
        state.cursor = CursorState::Fresh;
        Ok(())
    }

    /// Pull the next chunk of results, or `None` once the cursor reports
    /// complete. Chunk boundaries follow the buffer budget, not any
    /// logical record boundary; concatenate chunks to reconstruct the
    /// full result set.
    pub fn read_next(&mut self) -> Result<Option<ArrayBuffers>> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        if state.mode != OpenMode::Read {
            return Err(SndaError::Mode {
                op: "read_next",
                mode: state.mode.as_str(),
            });
        }
        if state.cursor == CursorState::Complete {
            return Ok(None);
        }
        if state.stream.is_none() {
            let schema = state.resource.schema();
            let columns = read_columns(schema, &state.column_names);
            let stream =
                state
                    .resource
                    .submit_query(&state.selector, state.result_order, &columns)?;
            state.stream = Some(stream);
            state.cursor = CursorState::Incomplete;
        }
        let stream = state.stream.as_mut().ok_or(SndaError::NotOpen)?;
        match stream.next_chunk(state.batch_size)? {
            Some(chunk) => {
                state.cursor = if stream.is_exhausted() {
                    CursorState::Complete
                } else {
                    CursorState::Incomplete
                };
                Ok(Some(chunk))
            }
            None => {
                state.cursor = CursorState::Complete;
                Ok(None)
            }
        }
    }

    /// True iff the most recent `read_next` returned the final chunk for
    /// the current query configuration
    pub fn results_complete(&self) -> Result<bool> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        Ok(state.cursor == CursorState::Complete)
    }

    /// Validate a buffer set against the schema and stage it for commit
    /// at close
    pub fn write(&mut self, buffers: &ArrayBuffers) -> Result<()> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        if state.mode != OpenMode::Write {
            return Err(SndaError::Mode {
                op: "write",
                mode: state.mode.as_str(),
            });
        }
        validate_write_buffers(state.resource.schema(), buffers)?;
        state.resource.write(buffers)
    }

    /// Constrain a dimension to a single point
    pub fn set_dim_point(&mut self, dim: &str, point: DimensionValue) -> Result<()> {
        self.set_dim_points(dim, &[point])
    }

    /// Constrain a dimension to a set of discrete points; augments any
    /// constraint already set on the dimension
    pub fn set_dim_points(&mut self, dim: &str, points: &[DimensionValue]) -> Result<()> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        let spec = active_dim(state, dim)?;
        let dtype = spec.dtype;
        for point in points {
            if point.data_type() != dtype {
                return Err(SndaError::TypeMismatch {
                    declared: dtype,
                    requested: point.data_type(),
                });
            }
        }
        state.selector.entry(dim).points.extend_from_slice(points);
        Ok(())
    }

    /// Constrain a dimension to one deterministic partition of an ordered
    /// point set. Slices for indices `0..partition_count` tile the input
    /// exactly once; a high `partition_index` over a short input yields an
    /// empty slice (and leaves the dimension unconstrained only if no
    /// other constraint was set).
    pub fn set_dim_points_partitioned(
        &mut self,
        dim: &str,
        points: &[DimensionValue],
        partition_index: usize,
        partition_count: usize,
    ) -> Result<()> {
        let slice = partition_slice(points.len(), partition_index, partition_count)?;
        if slice.is_empty() {
            return self.mark_empty_partition(dim);
        }
        self.set_dim_points(dim, &points[slice])
    }

    // An empty partition contributes nothing to the union constraint; with
    // no other contribution on the dimension, the query matches no cells.
    fn mark_empty_partition(&mut self, dim: &str) -> Result<()> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        active_dim(state, dim)?;
        state.selector.entry(dim).empty_partition = true;
        Ok(())
    }

    /// Constrain a dimension to a set of inclusive ranges; augments any
    /// constraint already set on the dimension
    pub fn set_dim_ranges(
        &mut self,
        dim: &str,
        ranges: &[(DimensionValue, DimensionValue)],
    ) -> Result<()> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        let spec = active_dim(state, dim)?;
        let dtype = spec.dtype;
        for (lower, upper) in ranges {
            if lower.data_type() != dtype {
                return Err(SndaError::TypeMismatch {
                    declared: dtype,
                    requested: lower.data_type(),
                });
            }
            validate_range(lower, upper)?;
        }
        state
            .selector
            .entry(dim)
            .ranges
            .extend_from_slice(ranges);
        Ok(())
    }

    /// Constrain a dimension to one deterministic partition of an ordered
    /// range set
    pub fn set_dim_ranges_partitioned(
        &mut self,
        dim: &str,
        ranges: &[(DimensionValue, DimensionValue)],
        partition_index: usize,
        partition_count: usize,
    ) -> Result<()> {
        let slice = partition_slice(ranges.len(), partition_index, partition_count)?;
        if slice.is_empty() {
            return self.mark_empty_partition(dim);
        }
        self.set_dim_ranges(dim, &ranges[slice])
    }

    /// Tightest occupied bound of an index column, or `None` when no data
    /// was written; contrast with [`Array::domain`]
    pub fn non_empty_domain(
        &self,
        dim: &str,
    ) -> Result<Option<(DimensionValue, DimensionValue)>> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        state.resource.non_empty_domain(dim)
    }

    /// Occupied bound of a var-sized (string) index column
    pub fn non_empty_domain_var(&self, dim: &str) -> Result<Option<(String, String)>> {
        match self.non_empty_domain(dim)? {
            None => Ok(None),
            Some((DimensionValue::Str(lo), DimensionValue::Str(hi))) => Ok(Some((lo, hi))),
            Some((lo, _)) => Err(SndaError::TypeMismatch {
                declared: lo.data_type(),
                requested: snda_core::DataType::StringUtf8,
            }),
        }
    }

    /// Declared schema bound of an index column
    pub fn domain(&self, dim: &str) -> Result<(DimensionValue, DimensionValue)> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        state.resource.schema().domain(dim)
    }

    /// Stage a metadata upsert; durable once this Write session closes,
    /// but visible to reads within the session immediately
    pub fn set_metadata(&mut self, key: &str, value: MetadataValue) -> Result<()> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        state.resource.set_metadata(key, value)
    }

    /// Stage a metadata deletion; deleting an absent key is a no-op
    pub fn delete_metadata(&mut self, key: &str) -> Result<()> {
        let state = self.state.as_mut().ok_or(SndaError::NotOpen)?;
        state.resource.delete_metadata(key)
    }

    /// Look up one metadata entry; absent keys return `None`, not an error
    pub fn get_metadata(&self, key: &str) -> Result<Option<MetadataValue>> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        state.resource.get_metadata(key)
    }

    /// The full metadata mapping
    pub fn get_metadata_all(&self) -> Result<BTreeMap<String, MetadataValue>> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        state.resource.get_metadata_all()
    }

    /// True if the key exists in metadata
    pub fn has_metadata(&self, key: &str) -> Result<bool> {
        Ok(self.get_metadata(key)?.is_some())
    }

    /// Number of metadata entries
    pub fn metadata_num(&self) -> Result<u64> {
        Ok(self.get_metadata_all()?.len() as u64)
    }

    /// Total number of stored non-empty cells. Requires a full scan in
    /// the reference engine; documented as expensive.
    pub fn nnz(&self) -> Result<u64> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        state.resource.nnz()
    }

    /// Number of committed fragments visible to this session
    pub fn fragment_count(&self) -> Result<usize> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        state.resource.fragment_count()
    }

    /// Declared schema; requires an open handle
    pub fn schema(&self) -> Result<&Schema> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        Ok(state.resource.schema())
    }

    /// Names of all declared index columns
    pub fn dim_names(&self) -> Result<Vec<String>> {
        Ok(self.schema()?.dim_names())
    }

    /// Names of all attribute columns
    pub fn attr_names(&self) -> Result<Vec<String>> {
        Ok(self.schema()?.attr_names())
    }

    /// The active index-column subset of this session
    pub fn index_column_names(&self) -> Result<Vec<String>> {
        let state = self.state.as_ref().ok_or(SndaError::NotOpen)?;
        Ok(state.column_names.clone())
    }

    /// Number of dimensions
    pub fn ndim(&self) -> Result<usize> {
        Ok(self.schema()?.ndim())
    }

    /// Location string of the array; legal in any state
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Kind tag of the array; legal in any state
    pub fn array_type(&self) -> ArrayType {
        self.array_type
    }

    /// True while a session is open; legal in any state
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Mode of the current session, `None` while closed
    pub fn mode(&self) -> Option<OpenMode> {
        self.state.as_ref().map(|s| s.mode)
    }

    /// Timestamp range of the current session, if one was given
    pub fn timestamp(&self) -> Option<TimestampRange> {
        self.state.as_ref().and_then(|s| s.timestamp)
    }

    /// Result order of the current session, `None` while closed
    pub fn result_order(&self) -> Option<ResultOrder> {
        self.state.as_ref().map(|s| s.result_order)
    }
}

/// Resolve the requested index-column subset, defaulting to all declared
/// index columns, preserving schema declaration order
fn resolve_index_columns(schema: &Schema, column_names: &[String]) -> Result<Vec<String>> {
    let declared = schema.dim_names();
    if column_names.is_empty() {
        return Ok(declared);
    }
    for name in column_names {
        if !declared.contains(name) {
            return Err(SndaError::Schema(format!(
                "column '{name}' is not a declared index column"
            )));
        }
    }
    Ok(declared
        .into_iter()
        .filter(|d| column_names.contains(d))
        .collect())
}

/// Columns emitted by a read: the active index columns plus every
/// attribute column, in schema declaration order
fn read_columns(schema: &Schema, active: &[String]) -> Vec<String> {
    schema
        .columns()
        .iter()
        .filter(|c| !c.is_index || active.contains(&c.name))
        .map(|c| c.name.clone())
        .collect()
}

fn active_dim<'a>(state: &'a OpenState, dim: &str) -> Result<&'a ColumnSpec> {
    if !state.column_names.iter().any(|n| n == dim) {
        return Err(SndaError::Schema(format!(
            "column '{dim}' is not an active index column"
        )));
    }
    state.resource.schema().require_column(dim)
}

/// Check a write payload column-for-column against the schema: exact
/// column set, matching types, equal row counts, and coordinates inside
/// the declared domain
fn validate_write_buffers(schema: &Schema, buffers: &ArrayBuffers) -> Result<()> {
    for name in buffers.names() {
        if schema.column(name).is_none() {
            return Err(SndaError::Schema(format!(
                "buffer column '{name}' is not in the schema"
            )));
        }
    }
    let rows = buffers.num_rows();
    for spec in schema.columns() {
        let buffer = buffers.at(&spec.name)?;
        if buffer.data_type() != spec.dtype {
            return Err(SndaError::TypeMismatch {
                declared: spec.dtype,
                requested: buffer.data_type(),
            });
        }
        if buffer.len() != rows {
            return Err(SndaError::Schema(format!(
                "buffer column '{}' has {} rows, expected {}",
                spec.name,
                buffer.len(),
                rows
            )));
        }
        if let Some((lower, upper)) = &spec.domain {
            for row in 0..rows {
                let value = buffer.data().value_at(row).ok_or_else(|| {
                    SndaError::Schema(format!("buffer column '{}' row {row} unreadable", spec.name))
                })?;
                if !value.in_range(lower, upper).unwrap_or(false) {
                    return Err(SndaError::Schema(format!(
                        "coordinate {value} outside declared domain [{lower}, {upper}] of '{}'",
                        spec.name
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snda_core::{ColumnBuffer, DataType, SchemaBuilder};

    fn int64_domain(lo: i64, hi: i64) -> (DimensionValue, DimensionValue) {
        (DimensionValue::Int64(lo), DimensionValue::Int64(hi))
    }

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .index_column("dim0", DataType::Int64, int64_domain(0, 99))
            .attr_column("attr0", DataType::Float32)
            .build()
            .unwrap()
    }

    fn cells(dims: Vec<i64>, attrs: Vec<f32>) -> ArrayBuffers {
        let mut bufs = ArrayBuffers::new();
        bufs.emplace(ColumnBuffer::new("dim0", dims)).unwrap();
        bufs.emplace(ColumnBuffer::new("attr0", attrs)).unwrap();
        bufs
    }

    fn create_with_rows(ctx: &Context, uri: &str, dims: Vec<i64>, attrs: Vec<f32>) {
        Array::create(ctx, uri, ArrayType::SparseNDArray, &test_schema()).unwrap();
        let mut array = Array::open(
            ctx,
            uri,
            ArrayType::SparseNDArray,
            OpenMode::Write,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();
        array.write(&cells(dims, attrs)).unwrap();
        array.close().unwrap();
    }

    fn open_reader(ctx: &Context, uri: &str) -> Array {
        Array::open(
            ctx,
            uri,
            ArrayType::SparseNDArray,
            OpenMode::Read,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap()
    }

    fn read_all(array: &mut Array) -> ArrayBuffers {
        let mut out = ArrayBuffers::new();
        while let Some(chunk) = array.read_next().unwrap() {
            out.append(chunk).unwrap();
            if array.results_complete().unwrap() {
                break;
            }
        }
        out
    }

    #[test]
    fn test_create_leaves_handle_closed() {
        let ctx = Context::in_memory();
        let array =
            Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()).unwrap();
        assert!(!array.is_open());
        assert_eq!(array.uri(), "mem://t");
        assert_eq!(array.array_type().kind(), "SparseNDArray");
        assert!(matches!(array.schema(), Err(SndaError::NotOpen)));
    }

    #[test]
    fn test_round_trip_scenario() {
        // create, write {1,2,3}, close, reopen read, range [0,3]
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t1", vec![1, 2, 3], vec![1.0, 2.0, 3.0]);

        let mut array = open_reader(&ctx, "mem://t1");
        array
            .set_dim_ranges("dim0", &[int64_domain(0, 3)])
            .unwrap();
        let result = array.read_next().unwrap().unwrap();
        assert!(array.results_complete().unwrap());
        let dims: &[i64] = result.at("dim0").unwrap().as_slice().unwrap();
        let attrs: &[f32] = result.at("attr0").unwrap().as_slice().unwrap();
        assert_eq!(dims, &[1, 2, 3]);
        assert_eq!(attrs, &[1.0, 2.0, 3.0]);
        assert!(array.read_next().unwrap().is_none());
    }

    #[test]
    fn test_chunked_read_neither_drops_nor_duplicates() {
        let ctx = Context::in_memory();
        let dims: Vec<i64> = (0..50).collect();
        let attrs: Vec<f32> = (0..50).map(|i| i as f32).collect();
        create_with_rows(&ctx, "mem://t", dims.clone(), attrs.clone());

        let mut array = open_reader(&ctx, "mem://t");
        array.reset(&[], Some(7), ResultOrder::RowMajor).unwrap();
        let mut chunks = 0;
        let mut out = ArrayBuffers::new();
        loop {
            let chunk = array.read_next().unwrap().unwrap();
            assert!(chunk.num_rows() <= 7);
            chunks += 1;
            out.append(chunk).unwrap();
            if array.results_complete().unwrap() {
                break;
            }
        }
        assert!(chunks > 1);
        let got: &[i64] = out.at("dim0").unwrap().as_slice().unwrap();
        assert_eq!(got, dims.as_slice());
        let got: &[f32] = out.at("attr0").unwrap().as_slice().unwrap();
        assert_eq!(got, attrs.as_slice());
    }

    #[test]
    fn test_reset_restarts_the_query() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![1, 2, 3], vec![1.0, 2.0, 3.0]);

        let mut array = open_reader(&ctx, "mem://t");
        array.set_dim_point("dim0", DimensionValue::Int64(2)).unwrap();
        let first = read_all(&mut array);
        assert_eq!(first.num_rows(), 1);
        assert!(array.results_complete().unwrap());

        // Complete is sticky until reset
        assert!(array.read_next().unwrap().is_none());

        array.reset(&[], None, ResultOrder::Automatic).unwrap();
        assert!(!array.results_complete().unwrap());
        let all = read_all(&mut array);
        assert_eq!(all.num_rows(), 3);
    }

    #[test]
    fn test_selector_augments_until_reset() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![1, 2, 3, 10], vec![0.0; 4]);

        let mut array = open_reader(&ctx, "mem://t");
        array.set_dim_point("dim0", DimensionValue::Int64(1)).unwrap();
        array
            .set_dim_ranges("dim0", &[int64_domain(9, 12)])
            .unwrap();
        let out = read_all(&mut array);
        let dims: &[i64] = out.at("dim0").unwrap().as_slice().unwrap();
        assert_eq!(dims, &[1, 10]);
    }

    #[test]
    fn test_mode_errors() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![1], vec![1.0]);

        let mut writer = Array::open(
            &ctx,
            "mem://t",
            ArrayType::SparseNDArray,
            OpenMode::Write,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();
        assert!(matches!(writer.read_next(), Err(SndaError::Mode { .. })));
        writer.close().unwrap();

        let mut reader = open_reader(&ctx, "mem://t");
        assert!(matches!(
            reader.write(&cells(vec![2], vec![2.0])),
            Err(SndaError::Mode { .. })
        ));
        assert!(matches!(
            reader.set_metadata("k", MetadataValue::from_str("v")),
            Err(SndaError::Mode { .. })
        ));
    }

    #[test]
    fn test_closed_handle_rejects_operations() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![1], vec![1.0]);
        let mut array = open_reader(&ctx, "mem://t");
        array.close().unwrap();
        // Idempotent
        array.close().unwrap();

        assert!(!array.is_open());
        assert_eq!(array.mode(), None);
        assert_eq!(array.uri(), "mem://t");
        assert!(matches!(array.read_next(), Err(SndaError::NotOpen)));
        assert!(matches!(array.nnz(), Err(SndaError::NotOpen)));
        assert!(matches!(array.get_metadata("k"), Err(SndaError::NotOpen)));
        assert!(matches!(
            array.reset(&[], None, ResultOrder::Automatic),
            Err(SndaError::NotOpen)
        ));
    }

    #[test]
    fn test_open_with_unknown_column_fails() {
        let ctx = Context::in_memory();
        Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()).unwrap();
        let err = Array::open(
            &ctx,
            "mem://t",
            ArrayType::SparseNDArray,
            OpenMode::Read,
            &["attr0".to_string()],
            ResultOrder::Automatic,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SndaError::Schema(_)));

        // Empty defaults to all declared index columns
        let array = open_reader(&ctx, "mem://t");
        assert_eq!(array.index_column_names().unwrap(), vec!["dim0"]);
    }

    #[test]
    fn test_create_twice_fails() {
        let ctx = Context::in_memory();
        Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()).unwrap();
        assert!(matches!(
            Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()),
            Err(SndaError::AlreadyExists(_))
        ));
        assert!(matches!(
            Array::open(
                &ctx,
                "mem://other",
                ArrayType::SparseNDArray,
                OpenMode::Read,
                &[],
                ResultOrder::Automatic,
                None,
            ),
            Err(SndaError::NotFound(_))
        ));
    }

    #[test]
    fn test_partitioned_single_point() {
        // Exactly one of the two partitions holds the point
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![5], vec![5.0]);

        let mut counts = Vec::new();
        for partition_index in 0..2 {
            let mut array = open_reader(&ctx, "mem://t");
            array
                .set_dim_points_partitioned(
                    "dim0",
                    &[DimensionValue::Int64(5)],
                    partition_index,
                    2,
                )
                .unwrap();
            counts.push(read_all(&mut array).num_rows());
        }
        assert_eq!(counts, vec![1, 0]);
    }

    #[test]
    fn test_partitioned_points_tile_exactly() {
        let ctx = Context::in_memory();
        let dims: Vec<i64> = (0..23).collect();
        create_with_rows(&ctx, "mem://t", dims.clone(), vec![0.0; 23]);
        let points: Vec<DimensionValue> = dims.iter().map(|d| DimensionValue::Int64(*d)).collect();

        let mut seen = Vec::new();
        for partition_index in 0..4 {
            let mut array = open_reader(&ctx, "mem://t");
            array
                .set_dim_points_partitioned("dim0", &points, partition_index, 4)
                .unwrap();
            let out = read_all(&mut array);
            let got: &[i64] = out.at("dim0").unwrap().as_slice().unwrap();
            seen.extend_from_slice(got);
        }
        seen.sort_unstable();
        assert_eq!(seen, dims);
    }

    #[test]
    fn test_partitioned_ranges_tile_exactly() {
        let ctx = Context::in_memory();
        let dims: Vec<i64> = (0..30).collect();
        create_with_rows(&ctx, "mem://t", dims.clone(), vec![0.0; 30]);
        let ranges: Vec<(DimensionValue, DimensionValue)> =
            (0..6).map(|i| int64_domain(i * 5, i * 5 + 4)).collect();

        // 6 ranges over 4 partitions: ceiling blocks of 2, last one empty
        let mut seen = Vec::new();
        for partition_index in 0..4 {
            let mut array = open_reader(&ctx, "mem://t");
            array
                .set_dim_ranges_partitioned("dim0", &ranges, partition_index, 4)
                .unwrap();
            let out = read_all(&mut array);
            let got: &[i64] = out.at("dim0").unwrap().as_slice().unwrap();
            seen.extend_from_slice(got);
        }
        seen.sort_unstable();
        assert_eq!(seen, dims);
    }

    #[test]
    fn test_string_dimension_round_trip() {
        let ctx = Context::in_memory();
        let schema = SchemaBuilder::new()
            .var_index_column("name")
            .attr_column("attr0", DataType::Float32)
            .build()
            .unwrap();
        Array::create(&ctx, "mem://s", ArrayType::SparseNDArray, &schema).unwrap();

        let mut writer = Array::open(
            &ctx,
            "mem://s",
            ArrayType::SparseNDArray,
            OpenMode::Write,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();
        let names: Vec<String> = ["banana", "apple", "cherry"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut cells = ArrayBuffers::new();
        cells.emplace(ColumnBuffer::new("name", names)).unwrap();
        cells
            .emplace(ColumnBuffer::new("attr0", vec![1.0f32, 2.0, 3.0]))
            .unwrap();
        writer.write(&cells).unwrap();
        writer.close().unwrap();

        let mut reader = Array::open(
            &ctx,
            "mem://s",
            ArrayType::SparseNDArray,
            OpenMode::Read,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();
        assert_eq!(
            reader.non_empty_domain_var("name").unwrap(),
            Some(("apple".to_string(), "cherry".to_string()))
        );
        reader
            .set_dim_point("name", DimensionValue::Str("banana".into()))
            .unwrap();
        let out = read_all(&mut reader);
        assert_eq!(out.num_rows(), 1);
        let attrs: &[f32] = out.at("attr0").unwrap().as_slice().unwrap();
        assert_eq!(attrs, &[1.0]);
    }

    #[test]
    fn test_non_empty_domain_var_rejects_fixed_dimension() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![1, 2], vec![1.0, 2.0]);
        let array = open_reader(&ctx, "mem://t");
        assert!(matches!(
            array.non_empty_domain_var("dim0"),
            Err(SndaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_metadata_staged_visible_and_durable_at_close() {
        let ctx = Context::in_memory();
        Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()).unwrap();

        let mut writer = Array::open(
            &ctx,
            "mem://t",
            ArrayType::SparseNDArray,
            OpenMode::Write,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();
        writer
            .set_metadata("species", MetadataValue::from_str("mouse"))
            .unwrap();
        // Staged but already visible inside the same session
        assert!(writer.has_metadata("species").unwrap());
        assert_eq!(writer.metadata_num().unwrap(), 1);

        // Not yet visible to an independent reader
        let reader = open_reader(&ctx, "mem://t");
        assert!(!reader.has_metadata("species").unwrap());

        writer.close().unwrap();

        let reader = open_reader(&ctx, "mem://t");
        let value = reader.get_metadata("species").unwrap().unwrap();
        assert_eq!(value.as_str().unwrap(), "mouse");
        assert_eq!(reader.get_metadata_all().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_metadata_absent_key_is_noop() {
        let ctx = Context::in_memory();
        Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()).unwrap();
        let mut writer = Array::open(
            &ctx,
            "mem://t",
            ArrayType::SparseNDArray,
            OpenMode::Write,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();
        writer
            .set_metadata("keep", MetadataValue::from_values(&[1i64]))
            .unwrap();
        writer.delete_metadata("never-existed").unwrap();
        assert_eq!(writer.metadata_num().unwrap(), 1);
        writer.close().unwrap();
    }

    #[test]
    fn test_domain_vs_non_empty_domain() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![10, 20], vec![0.0, 0.0]);
        let array = open_reader(&ctx, "mem://t");
        assert_eq!(array.domain("dim0").unwrap(), int64_domain(0, 99));
        assert_eq!(
            array.non_empty_domain("dim0").unwrap(),
            Some(int64_domain(10, 20))
        );
        assert!(matches!(
            array.domain("attr0"),
            Err(SndaError::Schema(_))
        ));
    }

    #[test]
    fn test_write_validation() {
        let ctx = Context::in_memory();
        Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()).unwrap();
        let mut writer = Array::open(
            &ctx,
            "mem://t",
            ArrayType::SparseNDArray,
            OpenMode::Write,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();

        // Missing attribute column
        let mut partial = ArrayBuffers::new();
        partial
            .emplace(ColumnBuffer::new("dim0", vec![1i64]))
            .unwrap();
        assert!(matches!(writer.write(&partial), Err(SndaError::Schema(_))));

        // Wrong attribute type
        let mut wrong = ArrayBuffers::new();
        wrong.emplace(ColumnBuffer::new("dim0", vec![1i64])).unwrap();
        wrong
            .emplace(ColumnBuffer::new("attr0", vec![1.0f64]))
            .unwrap();
        assert!(matches!(
            writer.write(&wrong),
            Err(SndaError::TypeMismatch { .. })
        ));

        // Coordinate outside the declared domain
        assert!(matches!(
            writer.write(&cells(vec![100], vec![1.0])),
            Err(SndaError::Schema(_))
        ));

        // Ragged row counts
        assert!(matches!(
            writer.write(&cells(vec![1, 2], vec![1.0])),
            Err(SndaError::Schema(_))
        ));
        writer.close().unwrap();
    }

    #[test]
    fn test_selector_type_checks() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![1], vec![1.0]);
        let mut array = open_reader(&ctx, "mem://t");
        assert!(matches!(
            array.set_dim_point("dim0", DimensionValue::UInt64(1)),
            Err(SndaError::TypeMismatch { .. })
        ));
        assert!(matches!(
            array.set_dim_point("nope", DimensionValue::Int64(1)),
            Err(SndaError::Schema(_))
        ));
        assert!(matches!(
            array.set_dim_point("attr0", DimensionValue::Int64(1)),
            Err(SndaError::Schema(_))
        ));
    }

    #[test]
    fn test_row_major_order_independent_of_write_order() {
        use rand::seq::SliceRandom;

        let ctx = Context::in_memory();
        let mut dims: Vec<i64> = (0..40).collect();
        dims.shuffle(&mut rand::thread_rng());
        let attrs: Vec<f32> = dims.iter().map(|d| *d as f32).collect();
        create_with_rows(&ctx, "mem://t", dims, attrs);

        let mut array = Array::open(
            &ctx,
            "mem://t",
            ArrayType::SparseNDArray,
            OpenMode::Read,
            &[],
            ResultOrder::RowMajor,
            None,
        )
        .unwrap();
        let out = read_all(&mut array);
        let got: &[i64] = out.at("dim0").unwrap().as_slice().unwrap();
        let expected: Vec<i64> = (0..40).collect();
        assert_eq!(got, expected.as_slice());
        // Attributes travel with their coordinates
        let attrs: &[f32] = out.at("attr0").unwrap().as_slice().unwrap();
        assert!(attrs.iter().zip(got).all(|(a, d)| *a == *d as f32));
    }

    #[test]
    fn test_reopen_keeps_selector_resets_cursor() {
        let ctx = Context::in_memory();
        create_with_rows(&ctx, "mem://t", vec![1, 2, 3], vec![1.0, 2.0, 3.0]);

        let mut array = open_reader(&ctx, "mem://t");
        array
            .set_dim_ranges("dim0", &[int64_domain(2, 3)])
            .unwrap();
        let first = read_all(&mut array);
        assert_eq!(first.num_rows(), 2);

        array.reopen(OpenMode::Read, None).unwrap();
        assert!(array.is_open());
        assert!(!array.results_complete().unwrap());
        // Selector survived the reopen
        let again = read_all(&mut array);
        assert_eq!(again.num_rows(), 2);
    }

    #[test]
    fn test_reopen_write_commits() {
        let ctx = Context::in_memory();
        Array::create(&ctx, "mem://t", ArrayType::SparseNDArray, &test_schema()).unwrap();
        let mut array = Array::open(
            &ctx,
            "mem://t",
            ArrayType::SparseNDArray,
            OpenMode::Write,
            &[],
            ResultOrder::Automatic,
            None,
        )
        .unwrap();
        array.write(&cells(vec![7], vec![7.0])).unwrap();
        array.reopen(OpenMode::Read, None).unwrap();
        assert_eq!(array.nnz().unwrap(), 1);
        let out = read_all(&mut array);
        assert_eq!(out.num_rows(), 1);
    }
}
