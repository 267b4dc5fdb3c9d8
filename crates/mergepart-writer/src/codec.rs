// Column file encoding settings
//
// Maps the part's default codec onto Parquet compression and builds the
// writer properties shared by every column file of a part.

use crate::error::{PartWriterError, Result};
pub use mergepart_config::CompressionCodec;
use mergepart_config::WriterSettings;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

pub(crate) fn parquet_compression(codec: CompressionCodec) -> Result<Compression> {
    match codec {
        CompressionCodec::None => Ok(Compression::UNCOMPRESSED),
        CompressionCodec::Lz4 => Ok(Compression::LZ4_RAW),
        CompressionCodec::Zstd(level) => {
            let level = ZstdLevel::try_new(level)
                .map_err(|e| PartWriterError::invalid_config(format!("zstd level: {}", e)))?;
            Ok(Compression::ZSTD(level))
        }
    }
}

/// Writer properties for column files
///
/// - One row group per granule, so the row group cap equals the largest granule
/// - Dictionary encoding enabled
/// - Page-level statistics for readers that skip inside a granule
pub(crate) fn column_writer_properties(
    codec: CompressionCodec,
    settings: &WriterSettings,
) -> Result<WriterProperties> {
    let metadata = vec![
        KeyValue {
            key: "mergepart.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
        KeyValue {
            key: "mergepart.codec".to_string(),
            value: Some(codec.descriptor()),
        },
    ];

    Ok(WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(parquet_compression(codec)?)
        .set_data_page_size_limit(settings.data_page_size_bytes)
        .set_max_row_group_size(settings.index_granularity.max(1))
        .set_key_value_metadata(Some(metadata))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parquet_compression_mapping() {
        assert_eq!(
            parquet_compression(CompressionCodec::None).unwrap(),
            Compression::UNCOMPRESSED
        );
        assert_eq!(
            parquet_compression(CompressionCodec::Lz4).unwrap(),
            Compression::LZ4_RAW
        );
        assert!(matches!(
            parquet_compression(CompressionCodec::Zstd(3)).unwrap(),
            Compression::ZSTD(_)
        ));
    }

    #[test]
    fn test_row_group_cap_follows_granularity() {
        let settings = WriterSettings {
            index_granularity: 128,
            ..Default::default()
        };
        let props = column_writer_properties(CompressionCodec::Lz4, &settings).unwrap();
        assert_eq!(props.max_row_group_size(), 128);
    }
}
