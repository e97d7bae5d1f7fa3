//! Split one coordinate query across worker threads with query partitioning

use snda::{
    Array, ArrayBuffers, ArrayType, ColumnBuffer, Context, DataType, DimensionValue, OpenMode,
    Result, ResultOrder, SchemaBuilder,
};
use std::thread;

const PARTITIONS: usize = 4;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let ctx = Context::in_memory();
    let schema = SchemaBuilder::new()
        .index_column(
            "soma_joinid",
            DataType::Int64,
            (DimensionValue::Int64(0), DimensionValue::Int64(99_999)),
        )
        .attr_column("soma_data", DataType::Float32)
        .build()?;

    let uri = "mem://demo/partitioned";
    Array::create(&ctx, uri, ArrayType::SparseNDArray, &schema)?;

    let ids: Vec<i64> = (0..10_000).collect();
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
    cells.emplace(ColumnBuffer::new("soma_joinid", ids.clone()))?;
    cells.emplace(ColumnBuffer::new(
        "soma_data",
        ids.iter().map(|i| *i as f32).collect::<Vec<f32>>(),
    ))?;
    array.write(&cells)?;
    array.close()?;

    // Every worker reads the same point list but a disjoint partition of
    // it; the union of partitions is exactly the full selection.
    let points: Vec<DimensionValue> = (0..10_000)
        .filter(|i| i % 3 == 0)
        .map(DimensionValue::Int64)
        .collect();
    let expected = points.len();

    let mut workers = Vec::new();
    for partition_index in 0..PARTITIONS {
        let ctx = ctx.clone();
        let points = points.clone();
        workers.push(thread::spawn(move || -> Result<usize> {
            let mut array = Array::open(
                &ctx,
                uri,
                ArrayType::SparseNDArray,
                OpenMode::Read,
                &[],
                ResultOrder::Automatic,
                None,
            )?;
            array.set_dim_points_partitioned(
                "soma_joinid",
                &points,
                partition_index,
                PARTITIONS,
            )?;
            let mut rows = 0usize;
            while let Some(chunk) = array.read_next()? {
                rows += chunk.num_rows();
                if array.results_complete()? {
                    break;
                }
            }
            println!("partition {partition_index}/{PARTITIONS}: {rows} cells");
            array.close()?;
            Ok(rows)
        }));
    }

    let mut total = 0usize;
    for worker in workers {
        total += worker.join().map_err(|_| {
            snda::SndaError::Storage("partition worker panicked".to_string())
        })??;
    }
    println!("total {total} cells across {PARTITIONS} partitions (expected {expected})");
    assert_eq!(total, expected);
    Ok(())
}
