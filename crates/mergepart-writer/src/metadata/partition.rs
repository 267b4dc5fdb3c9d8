use super::{ipc_stream_bytes, read_ipc_stream, write_hashed_file, PARTITION_FILE_NAME};
use crate::checksums::Checksums;
use crate::disk::{Disk, PendingFile};
use crate::error::{PartWriterError, Result};
use arrow::array::RecordBatch;
use std::io::Write;
use std::path::Path;

/// Value of the partition key shared by every row of a part.
///
/// Empty when the table has no partition key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionValue {
    value: Option<RecordBatch>,
}

impl PartitionValue {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Partition value from a one-row batch of partition-key columns
    pub fn new(value: RecordBatch) -> Result<Self> {
        if value.num_rows() != 1 {
            return Err(PartWriterError::logical(format!(
                "partition value must have exactly one row, got {}",
                value.num_rows()
            )));
        }
        if value.num_columns() == 0 {
            return Ok(Self::empty());
        }
        Ok(Self { value: Some(value) })
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn value(&self) -> Option<&RecordBatch> {
        self.value.as_ref()
    }

    pub(crate) fn store(
        &self,
        disk: &dyn Disk,
        dir: &Path,
        checksums: &mut Checksums,
    ) -> Result<Option<PendingFile>> {
        let Some(value) = &self.value else {
            return Ok(None);
        };
        let bytes = ipc_stream_bytes(value, PARTITION_FILE_NAME)?;
        let file = write_hashed_file(disk, dir, PARTITION_FILE_NAME, checksums, |out| {
            out.write_all(&bytes)
        })?;
        Ok(Some(file))
    }

    pub fn load(data: &[u8]) -> Result<Self> {
        Self::new(read_ipc_stream(data, PARTITION_FILE_NAME)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::LocalDisk;
    use arrow::array::{ArrayRef, Int32Array, StringArray};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_requires_single_row() {
        let batch = RecordBatch::try_from_iter(vec![(
            "month",
            Arc::new(Int32Array::from(vec![202401, 202402])) as ArrayRef,
        )])
        .unwrap();
        assert!(PartitionValue::new(batch).unwrap_err().is_logical());
    }

    #[test]
    fn test_store_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp_dir.path());
        disk.create_dir_all(Path::new("part")).unwrap();

        let batch = RecordBatch::try_from_iter(vec![
            ("month", Arc::new(Int32Array::from(vec![202401])) as ArrayRef),
            ("region", Arc::new(StringArray::from(vec!["eu"])) as ArrayRef),
        ])
        .unwrap();
        let partition = PartitionValue::new(batch).unwrap();

        let mut checksums = Checksums::new();
        partition
            .store(&disk, Path::new("part"), &mut checksums)
            .unwrap()
            .unwrap()
            .finish(false)
            .unwrap();
        assert!(checksums.contains(PARTITION_FILE_NAME));

        let data = disk.read_file(Path::new("part/partition.dat")).unwrap();
        assert_eq!(PartitionValue::load(&data).unwrap(), partition);

        let mut checksums = Checksums::new();
        assert!(PartitionValue::empty()
            .store(&disk, Path::new("part"), &mut checksums)
            .unwrap()
            .is_none());
    }
}
