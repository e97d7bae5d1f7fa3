//! Write a sparse matrix into an in-memory array and read it back in chunks

use snda::{
    Array, ArrayBuffers, ArrayType, ColumnBuffer, Config, Context, DataType, DimensionValue,
    MemEngine, MetadataValue, OpenMode, Result, ResultOrder, SchemaBuilder,
    config::READ_BATCH_CELLS_KEY,
};
use std::sync::Arc;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // Small chunks so the incomplete-query loop actually iterates
    let config = Config::new().with(READ_BATCH_CELLS_KEY, "100");
    let ctx = Context::new(Arc::new(MemEngine::new()), config);

    let schema = SchemaBuilder::new()
        .index_column(
            "soma_dim_0",
            DataType::Int64,
            (DimensionValue::Int64(0), DimensionValue::Int64(9_999)),
        )
        .index_column(
            "soma_dim_1",
            DataType::Int64,
            (DimensionValue::Int64(0), DimensionValue::Int64(999)),
        )
        .attr_column("soma_data", DataType::Float64)
        .build()?;

    let uri = "mem://demo/matrix";
    Array::create(&ctx, uri, ArrayType::SparseNDArray, &schema)?;
    println!("created {uri}");

    // A diagonal band of 1000 cells
    let n = 1_000i64;
    let d0: Vec<i64> = (0..n).collect();
    let d1: Vec<i64> = (0..n).map(|i| i % 1_000).collect();
    let data: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();

    let mut array = Array::open(
        &ctx,
        uri,
        ArrayType::SparseNDArray,
        OpenMode::Write,
        &[],
        ResultOrder::Automatic,
        None,
    )?;
    let mut cells = ArrayBuffers::new();
    cells.emplace(ColumnBuffer::new("soma_dim_0", d0))?;
    cells.emplace(ColumnBuffer::new("soma_dim_1", d1))?;
    cells.emplace(ColumnBuffer::new("soma_data", data))?;
    array.write(&cells)?;
    array.set_metadata("measurement", MetadataValue::from_str("RNA"))?;
    array.close()?;
    println!("wrote {n} cells and one metadata entry");

    let mut array = Array::open(
        &ctx,
        uri,
        ArrayType::SparseNDArray,
        OpenMode::Read,
        &[],
        ResultOrder::RowMajor,
        None,
    )?;
    println!("nnz = {}", array.nnz()?);
    if let Some(value) = array.get_metadata("measurement")? {
        println!("measurement = {}", value.as_str()?);
    }

    // Constrain to the first quarter of the band
    array.set_dim_ranges(
        "soma_dim_0",
        &[(DimensionValue::Int64(0), DimensionValue::Int64(249))],
    )?;

    let mut chunks = 0usize;
    let mut rows = 0usize;
    while let Some(chunk) = array.read_next()? {
        chunks += 1;
        rows += chunk.num_rows();
        if array.results_complete()? {
            break;
        }
    }
    println!("read {rows} cells back in {chunks} chunks");
    array.close()?;
    Ok(())
}
