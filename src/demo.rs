// Sample part generation for the `demo` subcommand
//
// Writes a partitioned part with a UUID, a min/max index, one column that only
// ever holds defaults (pruned on finalize) and a projection sorted by message.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Int8Array, StringArray, UInt64Array};
use arrow::compute::sort_to_indices;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use mergepart_config::MergePartConfig;
use mergepart_writer::{
    Block, DataPart, Disk, FormatVersion, LocalDisk, MergedPartWriter, MinMaxIndex,
    PartWriterOptions, PartitionValue,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const PROJECTION_NAME: &str = "by_message";
// 2024-01-01
const PARTITION_DAY: i32 = 19_723;

pub struct DemoArgs {
    pub root: PathBuf,
    pub part: String,
    pub rows: usize,
    pub block_rows: usize,
    pub sync: bool,
}

fn table_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::UInt64, false),
        Field::new("event_date", DataType::Date32, false),
        Field::new("message", DataType::Utf8, false),
        Field::new("flags", DataType::Int8, false),
    ]))
}

fn projection_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("message", DataType::Utf8, false),
        Field::new("id", DataType::UInt64, false),
    ]))
}

fn sample_block(start: u64, rows: usize) -> Block {
    let ids: Vec<u64> = (start..start + rows as u64).collect();
    let messages: Vec<String> = ids.iter().map(|id| format!("event-{}", id % 7)).collect();

    Block::default()
        .with_column("id", Arc::new(UInt64Array::from(ids)))
        .with_column(
            "event_date",
            Arc::new(Date32Array::from(vec![PARTITION_DAY; rows])),
        )
        .with_column("message", Arc::new(StringArray::from(messages)))
        .with_column("flags", Arc::new(Int8Array::from(vec![0i8; rows])))
}

fn partition_value() -> Result<PartitionValue> {
    let batch = RecordBatch::try_from_iter(vec![(
        "event_date",
        Arc::new(Date32Array::from(vec![PARTITION_DAY])) as ArrayRef,
    )])?;
    Ok(PartitionValue::new(batch)?)
}

/// Write the sample part and return it once it is durable
pub fn run_demo(config: &MergePartConfig, args: &DemoArgs) -> Result<Arc<DataPart>> {
    let disk: Arc<dyn Disk> = Arc::new(LocalDisk::new(&args.root));
    let schema = table_schema();

    let mut part = DataPart::plain(&args.part, FormatVersion::V1, "");
    part.uuid = Uuid::new_v4();
    part.partition = partition_value()?;
    part.minmax_idx = MinMaxIndex::new(vec![schema.field_with_name("event_date")?.clone().into()]);

    let options = PartWriterOptions::new(config.writer.clone());
    let mut writer = MergedPartWriter::new(
        disk.clone(),
        &part,
        schema.clone(),
        options.clone().with_sort_key(["id"]),
    )
    .with_context(|| format!("Failed to open part '{}'", args.part))?;

    let projection = DataPart::projection(PROJECTION_NAME, &part);
    let mut projection_writer = MergedPartWriter::new(
        disk,
        &projection,
        projection_schema(),
        options.with_sort_key(["message"]),
    )?;

    let block_rows = args.block_rows.max(1);
    let mut written = 0;
    while written < args.rows {
        let rows = block_rows.min(args.rows - written);
        let block = sample_block(written as u64, rows);

        part.minmax_idx.update(&block)?;
        writer.write(&block)?;

        let messages = block
            .column_by_name("message")
            .context("sample block lost its message column")?;
        let order = sort_to_indices(messages.as_ref(), None, None)?;
        projection_writer.write_with_permutation(&block, &order)?;

        written += rows;
    }

    let finalizer = projection_writer.finalize_part(projection, args.sync, None, None)?;
    let projection = projection_writer.finish(finalizer)?;
    part.add_projection_part(PROJECTION_NAME, projection);

    let finalizer = writer.finalize_part(part, args.sync, None, None)?;
    let part = writer.finish(finalizer)?;

    info!(
        part = %part.name,
        rows = part.rows_count,
        columns = part.columns.fields().len(),
        "demo part written"
    );
    Ok(part)
}
