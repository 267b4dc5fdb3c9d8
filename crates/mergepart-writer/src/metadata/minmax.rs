use super::{ipc_stream_bytes, read_ipc_stream, write_hashed_file};
use crate::block::Block;
use crate::checksums::Checksums;
use crate::column_writer::escape_for_file_name;
use crate::disk::{Disk, PendingFile};
use crate::error::{PartWriterError, Result};
use arrow::array::{new_null_array, Array, ArrayRef, RecordBatch};
use arrow::compute::concat;
use arrow::datatypes::{Field, FieldRef, Schema};
use arrow::row::{RowConverter, SortField};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub fn minmax_file_name(column: &str) -> String {
    format!("minmax_{}.idx", escape_for_file_name(column))
}

/// Smallest and largest non-null value of one column, each a one-element array.
/// Both are null when the column only held nulls.
#[derive(Debug, Clone)]
pub struct MinMaxRange {
    pub min: ArrayRef,
    pub max: ArrayRef,
}

impl PartialEq for MinMaxRange {
    fn eq(&self, other: &Self) -> bool {
        self.min.as_ref() == other.min.as_ref() && self.max.as_ref() == other.max.as_ref()
    }
}

/// Per-column value ranges of the partition-key columns across a part
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinMaxIndex {
    columns: Vec<FieldRef>,
    ranges: Vec<MinMaxRange>,
    initialized: bool,
}

impl MinMaxIndex {
    pub fn new(columns: Vec<FieldRef>) -> Self {
        Self {
            columns,
            ranges: Vec::new(),
            initialized: false,
        }
    }

    pub fn columns(&self) -> &[FieldRef] {
        &self.columns
    }

    /// False until the first non-empty block is folded in, even for an index
    /// without columns
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn ranges(&self) -> &[MinMaxRange] {
        &self.ranges
    }

    /// Widen the ranges with the values of `block`
    pub fn update(&mut self, block: &Block) -> Result<()> {
        if block.rows() == 0 {
            return Ok(());
        }

        let mut ranges = Vec::with_capacity(self.columns.len());
        for (index, field) in self.columns.iter().enumerate() {
            let array = block.column_by_name(field.name()).ok_or_else(|| {
                PartWriterError::logical(format!(
                    "block has no column '{}' required by the min/max index",
                    field.name()
                ))
            })?;
            if array.data_type() != field.data_type() {
                return Err(PartWriterError::logical(format!(
                    "min/max column '{}' has type {}, expected {}",
                    field.name(),
                    array.data_type(),
                    field.data_type()
                )));
            }

            let mut candidates: Vec<&dyn Array> = vec![array.as_ref()];
            if let Some(previous) = self.ranges.get(index) {
                candidates.push(previous.min.as_ref());
                candidates.push(previous.max.as_ref());
            }
            let combined =
                concat(&candidates).map_err(|e| PartWriterError::encoding(field.name(), e))?;
            ranges.push(range_of(&combined, field.name())?);
        }

        self.ranges = ranges;
        self.initialized = true;
        Ok(())
    }

    pub(crate) fn store(
        &self,
        disk: &dyn Disk,
        dir: &Path,
        checksums: &mut Checksums,
    ) -> Result<Vec<PendingFile>> {
        let mut files = Vec::with_capacity(self.ranges.len());
        for (field, range) in self.columns.iter().zip(&self.ranges) {
            let name = minmax_file_name(field.name());
            let values = concat(&[range.min.as_ref(), range.max.as_ref()])
                .map_err(|e| PartWriterError::encoding(&name, e))?;
            let schema = Schema::new(vec![Field::new(
                field.name(),
                field.data_type().clone(),
                true,
            )]);
            let batch = RecordBatch::try_new(Arc::new(schema), vec![values])
                .map_err(|e| PartWriterError::encoding(&name, e))?;
            let bytes = ipc_stream_bytes(&batch, &name)?;
            files.push(write_hashed_file(disk, dir, &name, checksums, |out| {
                out.write_all(&bytes)
            })?);
        }
        Ok(files)
    }

    /// Parse one `minmax_<col>.idx` file
    pub fn load_range(data: &[u8]) -> Result<MinMaxRange> {
        let batch = read_ipc_stream(data, "minmax index")?;
        if batch.num_columns() != 1 || batch.num_rows() != 2 {
            return Err(PartWriterError::encoding(
                "minmax index",
                "expected one column with two rows",
            ));
        }
        let values = batch.column(0);
        Ok(MinMaxRange {
            min: values.slice(0, 1),
            max: values.slice(1, 1),
        })
    }
}

fn range_of(array: &ArrayRef, column: &str) -> Result<MinMaxRange> {
    let converter = RowConverter::new(vec![SortField::new(array.data_type().clone())])
        .map_err(|e| PartWriterError::encoding(column, e))?;
    let rows = converter
        .convert_columns(&[array.clone()])
        .map_err(|e| PartWriterError::encoding(column, e))?;

    let mut min: Option<usize> = None;
    let mut max: Option<usize> = None;
    for i in (0..array.len()).filter(|&i| array.is_valid(i)) {
        min = match min {
            Some(m) if rows.row(m) <= rows.row(i) => Some(m),
            _ => Some(i),
        };
        max = match max {
            Some(m) if rows.row(m) >= rows.row(i) => Some(m),
            _ => Some(i),
        };
    }

    Ok(match (min, max) {
        (Some(min), Some(max)) => MinMaxRange {
            min: array.slice(min, 1),
            max: array.slice(max, 1),
        },
        _ => MinMaxRange {
            min: new_null_array(array.data_type(), 1),
            max: new_null_array(array.data_type(), 1),
        },
    })
}
