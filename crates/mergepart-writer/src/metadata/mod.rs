//! Small per-part metadata files
//!
//! Each writer produces exactly one file, hashes it in the same pass, records
//! it in the ledger and hands back the sealed-but-unsynced handle.

mod minmax;
mod partition;
mod ttl;

pub use minmax::{minmax_file_name, MinMaxIndex, MinMaxRange};
pub use partition::PartitionValue;
pub use ttl::{TtlInfos, TtlInterval};

use crate::checksums::Checksums;
use crate::codec::CompressionCodec;
use crate::disk::{Disk, PendingFile};
use crate::error::{PartWriterError, Result};
use crate::hash::HashingWriter;
use arrow::array::RecordBatch;
use arrow::datatypes::{DataType, FieldRef, TimeUnit};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

pub const UUID_FILE_NAME: &str = "uuid.txt";
pub const PARTITION_FILE_NAME: &str = "partition.dat";
pub const COUNT_FILE_NAME: &str = "count.txt";
pub const TTL_FILE_NAME: &str = "ttl.txt";
pub const SERIALIZATION_FILE_NAME: &str = "serialization.json";
pub const COLUMNS_FILE_NAME: &str = "columns.txt";
pub const DEFAULT_CODEC_FILE_NAME: &str = "default_compression_codec.txt";
pub const CHECKSUMS_FILE_NAME: &str = "checksums.txt";
pub const PRIMARY_INDEX_FILE_NAME: &str = "primary.idx";

const COLUMNS_FORMAT_HEADER: &str = "columns format version: 1\n";

/// Create `dir/name`, fill it through `write`, and record it in `checksums`
pub(crate) fn write_hashed_file<F>(
    disk: &dyn Disk,
    dir: &Path,
    name: &str,
    checksums: &mut Checksums,
    write: F,
) -> Result<PendingFile>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let path = dir.join(name);
    let mut out = HashingWriter::new(disk.write_file(&path)?);
    write(&mut out).map_err(|e| PartWriterError::io(&path, e))?;
    checksums.add_file(name, out.count(), out.hash())?;

    let size = out.count();
    let mut file = PendingFile::new(path, out.into_inner());
    file.seal()?;
    debug!(file = name, size, "wrote part file");
    Ok(file)
}

pub(crate) fn write_count(
    disk: &dyn Disk,
    dir: &Path,
    rows: u64,
    checksums: &mut Checksums,
) -> Result<PendingFile> {
    write_hashed_file(disk, dir, COUNT_FILE_NAME, checksums, |out| {
        write!(out, "{}", rows)
    })
}

pub(crate) fn write_uuid(
    disk: &dyn Disk,
    dir: &Path,
    uuid: &Uuid,
    checksums: &mut Checksums,
) -> Result<PendingFile> {
    write_hashed_file(disk, dir, UUID_FILE_NAME, checksums, |out| {
        out.write_all(uuid.hyphenated().to_string().as_bytes())
    })
}

pub(crate) fn write_default_codec(
    disk: &dyn Disk,
    dir: &Path,
    codec: CompressionCodec,
    checksums: &mut Checksums,
) -> Result<PendingFile> {
    write_hashed_file(disk, dir, DEFAULT_CODEC_FILE_NAME, checksums, |out| {
        out.write_all(codec.descriptor().as_bytes())
    })
}

pub(crate) fn write_columns(
    disk: &dyn Disk,
    dir: &Path,
    columns: &[FieldRef],
    checksums: &mut Checksums,
) -> Result<PendingFile> {
    write_hashed_file(disk, dir, COLUMNS_FILE_NAME, checksums, |out| {
        write_columns_text(columns, out)
    })
}

/// Quote a column name with backticks, escaping backticks and backslashes
pub fn quote_column_name(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    for c in name.chars() {
        if c == '`' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('`');
    quoted
}

/// Render the column list in the `columns.txt` format
pub fn write_columns_text(columns: &[FieldRef], out: &mut dyn Write) -> std::io::Result<()> {
    out.write_all(COLUMNS_FORMAT_HEADER.as_bytes())?;
    writeln!(out, "{} columns:", columns.len())?;
    for field in columns {
        let name = quote_column_name(field.name());
        let type_name = type_name(field.data_type());
        if field.is_nullable() {
            writeln!(out, "{} Nullable({})", name, type_name)?;
        } else {
            writeln!(out, "{} {}", name, type_name)?;
        }
    }
    Ok(())
}

/// Storage type name of an Arrow type
pub fn type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Boolean => "Bool".to_string(),
        DataType::Int8 => "Int8".to_string(),
        DataType::Int16 => "Int16".to_string(),
        DataType::Int32 => "Int32".to_string(),
        DataType::Int64 => "Int64".to_string(),
        DataType::UInt8 => "UInt8".to_string(),
        DataType::UInt16 => "UInt16".to_string(),
        DataType::UInt32 => "UInt32".to_string(),
        DataType::UInt64 => "UInt64".to_string(),
        DataType::Float32 => "Float32".to_string(),
        DataType::Float64 => "Float64".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary => {
            "String".to_string()
        }
        DataType::Date32 => "Date32".to_string(),
        DataType::Timestamp(TimeUnit::Second, _) => "DateTime".to_string(),
        DataType::Timestamp(TimeUnit::Millisecond, _) => "DateTime64(3)".to_string(),
        DataType::Timestamp(TimeUnit::Microsecond, _) => "DateTime64(6)".to_string(),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => "DateTime64(9)".to_string(),
        DataType::Decimal128(precision, scale) => format!("Decimal({}, {})", precision, scale),
        other => other.to_string(),
    }
}

/// Encode a batch as an Arrow IPC stream
pub(crate) fn ipc_stream_bytes(batch: &RecordBatch, context: &str) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, &batch.schema())
            .map_err(|e| PartWriterError::encoding(context, e))?;
        writer
            .write(batch)
            .map_err(|e| PartWriterError::encoding(context, e))?;
        writer
            .finish()
            .map_err(|e| PartWriterError::encoding(context, e))?;
    }
    Ok(buffer)
}

/// Decode the single batch of an Arrow IPC stream
pub fn read_ipc_stream(data: &[u8], context: &str) -> Result<RecordBatch> {
    let mut reader =
        StreamReader::try_new(data, None).map_err(|e| PartWriterError::encoding(context, e))?;
    reader
        .next()
        .ok_or_else(|| PartWriterError::encoding(context, "empty IPC stream"))?
        .map_err(|e| PartWriterError::encoding(context, e))
}
