//! Blocks of named columns handed to the part writer

use crate::error::{PartWriterError, Result};
use arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use arrow::datatypes::*;

/// One named column of a block
#[derive(Debug, Clone)]
pub struct BlockColumn {
    pub name: String,
    pub array: ArrayRef,
}

/// A batch of rows across named columns.
///
/// Unlike a `RecordBatch`, a block is not validated on construction; the part
/// writer checks row counts when the block is written.
#[derive(Debug, Clone, Default)]
pub struct Block {
    columns: Vec<BlockColumn>,
}

impl Block {
    pub fn new(columns: Vec<BlockColumn>) -> Self {
        Self { columns }
    }

    pub fn from_record_batch(batch: &RecordBatch) -> Self {
        let columns = batch
            .schema()
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| BlockColumn {
                name: field.name().clone(),
                array: array.clone(),
            })
            .collect();
        Self { columns }
    }

    pub fn with_column(mut self, name: impl Into<String>, array: ArrayRef) -> Self {
        self.columns.push(BlockColumn {
            name: name.into(),
            array,
        });
        self
    }

    pub fn columns(&self) -> &[BlockColumn] {
        &self.columns
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ArrayRef> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.array)
    }

    /// Row count of the block; zero for a block without columns
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |column| column.array.len())
    }

    pub fn allocated_bytes(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.array.get_array_memory_size())
            .sum()
    }

    /// Every column must report the same number of rows
    pub fn check_number_of_rows(&self) -> Result<()> {
        let Some(first) = self.columns.first() else {
            return Ok(());
        };
        let expected = first.array.len();
        for column in &self.columns[1..] {
            if column.array.len() != expected {
                return Err(PartWriterError::logical(format!(
                    "sizes of columns doesn't match: '{}' has {} rows, '{}' has {} rows",
                    first.name,
                    expected,
                    column.name,
                    column.array.len()
                )));
            }
        }
        Ok(())
    }
}

impl From<RecordBatch> for Block {
    fn from(batch: RecordBatch) -> Self {
        Self::from_record_batch(&batch)
    }
}

/// Count values equal to the column's default.
///
/// For nullable columns the default is NULL. For non-nullable columns it is
/// the type's zero value (0, false, empty string or binary); NULL slots are
/// counted as defaults as well. Types without a zero value only count NULLs.
pub fn count_default_values(array: &dyn Array, nullable: bool) -> usize {
    let nulls = array.null_count();
    if nullable {
        return nulls;
    }
    nulls + count_zero_values(array)
}

fn count_zero_values(array: &dyn Array) -> usize {
    macro_rules! zeros {
        ($t:ty) => {
            array
                .as_primitive::<$t>()
                .iter()
                .filter(|v| *v == Some(Default::default()))
                .count()
        };
    }

    match array.data_type() {
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .filter(|v| *v == Some(false))
            .count(),
        DataType::Int8 => zeros!(Int8Type),
        DataType::Int16 => zeros!(Int16Type),
        DataType::Int32 => zeros!(Int32Type),
        DataType::Int64 => zeros!(Int64Type),
        DataType::UInt8 => zeros!(UInt8Type),
        DataType::UInt16 => zeros!(UInt16Type),
        DataType::UInt32 => zeros!(UInt32Type),
        DataType::UInt64 => zeros!(UInt64Type),
        DataType::Float32 => zeros!(Float32Type),
        DataType::Float64 => zeros!(Float64Type),
        DataType::Date32 => zeros!(Date32Type),
        DataType::Date64 => zeros!(Date64Type),
        DataType::Timestamp(TimeUnit::Second, _) => zeros!(TimestampSecondType),
        DataType::Timestamp(TimeUnit::Millisecond, _) => zeros!(TimestampMillisecondType),
        DataType::Timestamp(TimeUnit::Microsecond, _) => zeros!(TimestampMicrosecondType),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => zeros!(TimestampNanosecondType),
        DataType::Decimal128(_, _) => zeros!(Decimal128Type),
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .filter(|v| *v == Some(""))
            .count(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .filter(|v| *v == Some(""))
            .count(),
        DataType::Binary => array
            .as_binary::<i32>()
            .iter()
            .filter(|v| matches!(v, Some(bytes) if bytes.is_empty()))
            .count(),
        DataType::LargeBinary => array
            .as_binary::<i64>()
            .iter()
            .filter(|v| matches!(v, Some(bytes) if bytes.is_empty()))
            .count(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, Int64Array, StringArray};
    use std::sync::Arc;

    #[test]
    fn test_check_number_of_rows() {
        let block = Block::default()
            .with_column("a", Arc::new(Int64Array::from(vec![1, 2, 3])))
            .with_column("b", Arc::new(StringArray::from(vec!["x", "y"])));

        let err = block.check_number_of_rows().unwrap_err();
        assert!(err.is_logical());
        assert!(err.to_string().contains("'b' has 2 rows"));

        assert!(Block::default().check_number_of_rows().is_ok());
        assert_eq!(Block::default().rows(), 0);
    }

    #[test]
    fn test_count_default_values() {
        let ints = Int64Array::from(vec![Some(0), Some(5), None, Some(0)]);
        assert_eq!(count_default_values(&ints, false), 3);
        assert_eq!(count_default_values(&ints, true), 1);

        let strings = StringArray::from(vec!["", "a", ""]);
        assert_eq!(count_default_values(&strings, false), 2);

        let bools = BooleanArray::from(vec![false, true]);
        assert_eq!(count_default_values(&bools, false), 1);
    }

    #[test]
    fn test_from_record_batch_keeps_names_and_order() {
        let batch = RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            ("name", Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef),
        ])
        .unwrap();

        let block = Block::from(batch);
        let names: Vec<_> = block.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(block.rows(), 2);
        assert!(block.column_by_name("name").is_some());
    }
}
