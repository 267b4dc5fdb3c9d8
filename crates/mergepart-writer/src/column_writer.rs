//! Writer for a single column of a part
//!
//! Each column owns two files:
//! - `<name>.bin`: Parquet file with one row group per granule
//! - `<name>.mrk2`: one mark per granule, `(u64 offset, u64 rows)` little-endian
//!
//! Both files are opened on the first write, so a column that never receives
//! rows leaves nothing behind.

use crate::block::count_default_values;
use crate::checksums::Checksums;
use crate::disk::{Disk, PendingFile, WriteFile};
use crate::error::{PartWriterError, Result};
use crate::granularity::GranuleSlice;
use crate::hash::HashingWriter;
use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{FieldRef, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

pub const DATA_FILE_EXTENSION: &str = ".bin";
pub const MARKS_FILE_EXTENSION: &str = ".mrk2";

/// Escape a column name for use as a file name.
///
/// ASCII alphanumerics and `_` pass through; every other byte becomes `%XX`.
pub fn escape_for_file_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

pub fn data_file_name(column: &str) -> String {
    format!("{}{}", escape_for_file_name(column), DATA_FILE_EXTENSION)
}

pub fn marks_file_name(column: &str) -> String {
    format!("{}{}", escape_for_file_name(column), MARKS_FILE_EXTENSION)
}

type HashedFile = HashingWriter<Box<dyn WriteFile>>;

struct ColumnStreams {
    data: ArrowWriter<HashedFile>,
    marks: HashedFile,
    granule_offset: u64,
    granule_rows: u64,
}

impl ColumnStreams {
    fn write_mark(&mut self, path: &Path) -> Result<()> {
        let mut mark = [0u8; 16];
        mark[..8].copy_from_slice(&self.granule_offset.to_le_bytes());
        mark[8..].copy_from_slice(&self.granule_rows.to_le_bytes());
        self.marks
            .write_all(&mark)
            .map_err(|e| PartWriterError::io(path, e))?;
        self.granule_rows = 0;
        Ok(())
    }
}

pub struct ColumnWriter {
    field: FieldRef,
    schema: SchemaRef,
    disk: Arc<dyn Disk>,
    part_dir: PathBuf,
    properties: WriterProperties,
    streams: Option<ColumnStreams>,
    sealed: Vec<PendingFile>,
    rows: u64,
    defaults: u64,
}

impl ColumnWriter {
    pub fn new(
        field: FieldRef,
        disk: Arc<dyn Disk>,
        part_dir: PathBuf,
        properties: WriterProperties,
    ) -> Self {
        let schema = Arc::new(Schema::new(vec![field.clone()]));
        Self {
            field,
            schema,
            disk,
            part_dir,
            properties,
            streams: None,
            sealed: Vec::new(),
            rows: 0,
            defaults: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// True once rows were written and every one of them was a default value
    pub fn is_all_defaults(&self) -> bool {
        self.rows > 0 && self.defaults == self.rows
    }

    fn data_path(&self) -> PathBuf {
        self.part_dir.join(data_file_name(self.name()))
    }

    fn marks_path(&self) -> PathBuf {
        self.part_dir.join(marks_file_name(self.name()))
    }

    fn open(&mut self) -> Result<&mut ColumnStreams> {
        if self.streams.is_none() {
            let data_path = self.data_path();
            let data_file = HashingWriter::new(self.disk.write_file(&data_path)?);
            let data = ArrowWriter::try_new(
                data_file,
                self.schema.clone(),
                Some(self.properties.clone()),
            )
            .map_err(|e| PartWriterError::encoding(data_path.display().to_string(), e))?;
            let marks = HashingWriter::new(self.disk.write_file(&self.marks_path())?);
            trace!(column = %self.name(), "opened column files");
            self.streams = Some(ColumnStreams {
                data,
                marks,
                granule_offset: 0,
                granule_rows: 0,
            });
        }
        self.streams
            .as_mut()
            .ok_or_else(|| PartWriterError::logical("column streams missing after open"))
    }

    /// Append the rows of `slice` from `array`, cutting a granule where the
    /// slice says so.
    pub fn write(&mut self, array: &ArrayRef, slice: &GranuleSlice) -> Result<()> {
        if !self.sealed.is_empty() {
            return Err(PartWriterError::logical(format!(
                "column '{}' written after its files were sealed",
                self.name()
            )));
        }

        let chunk = array.slice(slice.offset, slice.rows);
        let defaults = count_default_values(chunk.as_ref(), self.field.is_nullable());
        let batch = RecordBatch::try_new(self.schema.clone(), vec![chunk]).map_err(|e| {
            PartWriterError::logical(format!("column '{}' does not match: {}", self.name(), e))
        })?;

        let data_path = self.data_path();
        let marks_path = self.marks_path();
        let streams = self.open()?;

        if slice.starts_granule {
            streams.granule_offset = streams.data.bytes_written() as u64;
        }
        streams
            .data
            .write(&batch)
            .map_err(|e| PartWriterError::encoding(data_path.display().to_string(), e))?;
        streams.granule_rows += slice.rows as u64;

        if slice.closes_granule {
            streams
                .data
                .flush()
                .map_err(|e| PartWriterError::encoding(data_path.display().to_string(), e))?;
            streams.write_mark(&marks_path)?;
        }

        self.rows += slice.rows as u64;
        self.defaults += defaults as u64;
        Ok(())
    }

    /// Close the content of both files and record them in the ledger.
    ///
    /// The handles stay open until [`ColumnWriter::finish`].
    pub fn fill_checksums(&mut self, checksums: &mut Checksums) -> Result<()> {
        let Some(mut streams) = self.streams.take() else {
            return Ok(());
        };
        let data_path = self.data_path();
        let marks_path = self.marks_path();

        if streams.granule_rows > 0 {
            streams
                .data
                .flush()
                .map_err(|e| PartWriterError::encoding(data_path.display().to_string(), e))?;
            streams.write_mark(&marks_path)?;
        }

        let data = streams
            .data
            .into_inner()
            .map_err(|e| PartWriterError::encoding(data_path.display().to_string(), e))?;
        checksums.add_file(data_file_name(self.name()), data.count(), data.hash())?;
        checksums.add_file(
            marks_file_name(self.name()),
            streams.marks.count(),
            streams.marks.hash(),
        )?;

        let mut data = PendingFile::new(data_path, data.into_inner());
        let mut marks = PendingFile::new(marks_path, streams.marks.into_inner());
        data.seal()?;
        marks.seal()?;
        self.sealed.push(data);
        self.sealed.push(marks);
        Ok(())
    }

    pub fn finish(&mut self, sync: bool) -> Result<()> {
        for file in self.sealed.drain(..) {
            file.finish(sync)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ColumnWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnWriter")
            .field("column", &self.name())
            .field("rows", &self.rows)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{column_writer_properties, CompressionCodec};
    use crate::disk::LocalDisk;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field};
    use mergepart_config::WriterSettings;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use tempfile::TempDir;

    fn writer(disk: Arc<dyn Disk>) -> ColumnWriter {
        let props =
            column_writer_properties(CompressionCodec::None, &WriterSettings::default()).unwrap();
        ColumnWriter::new(
            Arc::new(Field::new("value", DataType::Int64, false)),
            disk,
            PathBuf::from("part"),
            props,
        )
    }

    fn slice(offset: usize, rows: usize, starts: bool, closes: bool) -> GranuleSlice {
        GranuleSlice {
            offset,
            rows,
            starts_granule: starts,
            closes_granule: closes,
        }
    }

    #[test]
    fn test_escape_for_file_name() {
        assert_eq!(escape_for_file_name("plain_name1"), "plain_name1");
        assert_eq!(escape_for_file_name("a.b"), "a%2Eb");
        assert_eq!(escape_for_file_name("with space"), "with%20space");
        assert_eq!(data_file_name("n.x"), "n%2Ex.bin");
    }

    #[test]
    fn test_granules_become_row_groups_and_marks() {
        let temp_dir = TempDir::new().unwrap();
        let disk: Arc<dyn Disk> = Arc::new(LocalDisk::new(temp_dir.path()));
        disk.create_dir_all(Path::new("part")).unwrap();
        let mut column = writer(disk.clone());

        let array: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5]));
        column.write(&array, &slice(0, 4, true, true)).unwrap();
        column.write(&array, &slice(4, 1, true, false)).unwrap();

        let mut checksums = Checksums::new();
        column.fill_checksums(&mut checksums).unwrap();
        column.finish(false).unwrap();

        let data = disk.read_file(Path::new("part/value.bin")).unwrap();
        assert_eq!(checksums.get("value.bin").unwrap().size, data.len() as u64);

        let file = std::fs::File::open(temp_dir.path().join("part/value.bin")).unwrap();
        let reader = SerializedFileReader::new(file).unwrap();
        let row_groups: Vec<i64> = reader
            .metadata()
            .row_groups()
            .iter()
            .map(|rg| rg.num_rows())
            .collect();
        assert_eq!(row_groups, vec![4, 1]);

        let marks = disk.read_file(Path::new("part/value.mrk2")).unwrap();
        assert_eq!(marks.len(), 32);
        let first_offset = u64::from_le_bytes(marks[0..8].try_into().unwrap());
        let first_rows = u64::from_le_bytes(marks[8..16].try_into().unwrap());
        let second_offset = u64::from_le_bytes(marks[16..24].try_into().unwrap());
        let second_rows = u64::from_le_bytes(marks[24..32].try_into().unwrap());
        assert_eq!(first_offset, 4);
        assert_eq!(first_rows, 4);
        assert!(second_offset > first_offset);
        assert_eq!(second_rows, 1);
    }

    #[test]
    fn test_unwritten_column_creates_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let disk: Arc<dyn Disk> = Arc::new(LocalDisk::new(temp_dir.path()));
        disk.create_dir_all(Path::new("part")).unwrap();
        let mut column = writer(disk.clone());

        let mut checksums = Checksums::new();
        column.fill_checksums(&mut checksums).unwrap();
        column.finish(true).unwrap();

        assert!(checksums.is_empty());
        assert!(disk.list_dir(Path::new("part")).unwrap().is_empty());
    }

    #[test]
    fn test_tracks_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let disk: Arc<dyn Disk> = Arc::new(LocalDisk::new(temp_dir.path()));
        disk.create_dir_all(Path::new("part")).unwrap();
        let mut column = writer(disk);

        let zeros: ArrayRef = Arc::new(Int64Array::from(vec![0, 0, 0]));
        column.write(&zeros, &slice(0, 3, true, false)).unwrap();
        assert!(column.is_all_defaults());

        let mixed: ArrayRef = Arc::new(Int64Array::from(vec![0, 7]));
        column.write(&mixed, &slice(0, 2, false, false)).unwrap();
        assert!(!column.is_all_defaults());
        assert_eq!(column.rows(), 5);
    }
}
