//! SNDA - Sparse N-Dimensional Array Access Layer
//!
//! This library provides handle-based access to sparse N-dimensional
//! arrays stored in a chunked columnar engine: open/close lifecycle,
//! multi-dimension query selection with partitioning, chunked streaming
//! reads, staged writes with commit-at-close, and string-keyed array
//! metadata.
//!
//! ## Architecture
//!
//! SNDA follows a clean specification/implementation separation:
//!
//! - **snda-core**: Pure data model, schema and buffer definitions,
//!   validation (no I/O)
//! - **snda**: The array handle layer, engine boundary traits, and the
//!   in-memory reference engine
//!
//! ## Quick Start
//!
//! ```rust
//! use snda::{Array, ArrayBuffers, ColumnBuffer, Context, DataType, DimensionValue,
//!            OpenMode, ResultOrder, SchemaBuilder};
//!
//! fn example() -> snda::Result<()> {
//!     let ctx = Context::in_memory();
//!     let schema = SchemaBuilder::new()
//!         .index_column(
//!             "soma_dim_0",
//!             DataType::Int64,
//!             (DimensionValue::Int64(0), DimensionValue::Int64(99)),
//!         )
//!         .attr_column("soma_data", DataType::Float32)
//!         .build()?;
//!     Array::create(&ctx, "mem://example", snda::ArrayType::SparseNDArray, &schema)?;
//!
//!     // Write sessions stage cells and commit at close
//!     let mut array = Array::open(
//!         &ctx, "mem://example", snda::ArrayType::SparseNDArray,
//!         OpenMode::Write, &[], ResultOrder::Automatic, None,
//!     )?;
//!     let mut cells = ArrayBuffers::new();
//!     cells.emplace(ColumnBuffer::new("soma_dim_0", vec![1i64, 2, 3]))?;
//!     cells.emplace(ColumnBuffer::new("soma_data", vec![1.0f32, 2.0, 3.0]))?;
//!     array.write(&cells)?;
//!     array.close()?;
//!
//!     // Read back a coordinate range in chunks
//!     let mut array = Array::open(
//!         &ctx, "mem://example", snda::ArrayType::SparseNDArray,
//!         OpenMode::Read, &[], ResultOrder::Automatic, None,
//!     )?;
//!     array.set_dim_ranges(
//!         "soma_dim_0",
//!         &[(DimensionValue::Int64(0), DimensionValue::Int64(2))],
//!     )?;
//!     while let Some(chunk) = array.read_next()? {
//!         println!("chunk of {} cells", chunk.num_rows());
//!         if array.results_complete()? {
//!             break;
//!         }
//!     }
//!     array.close()?;
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! ## Features
//!
//! - **Chunked reads**: Incomplete-query streaming through a fixed
//!   buffer budget, no result set held whole in memory
//! - **Query partitioning**: Deterministic tiling of point and range
//!   selections across workers
//! - **Snapshot isolation**: Timestamped fragments; readers see a fixed
//!   snapshot, writers commit atomically at close
//! - **Typed facades**: [`SparseNDArray`] and [`DenseNDArray`] with
//!   primitive-typed coordinate accessors
//! - **Type safety**: Strong typing with snda-core abstractions

// Re-export core abstractions and data model definitions
pub use snda_core::{
    // Buffer exchange
    ArrayBuffers, ColumnBuffer, ColumnData,
    // Schema and typing
    ArrayType, ColumnSpec, DataType, DimensionType, DimensionValue, Schema, SchemaBuilder,
    // Metadata values
    MetadataValue,
    // Lifecycle and ordering tags
    OpenMode, ResultOrder, TimestampRange,
    // Error handling
    Result, SndaError,
    // Validation utilities
    partition_slice, validate_range,
};

// Implementation modules
pub mod array;
pub mod config;
pub mod engine;
pub mod mem;
pub mod ndarray;

// Public exports
pub use array::Array;
pub use config::Config;
pub use engine::{Context, DimSelection, EngineArray, QuerySelector, QueryStream, StorageEngine};
pub use mem::MemEngine;
pub use ndarray::{DenseNDArray, SparseNDArray};
