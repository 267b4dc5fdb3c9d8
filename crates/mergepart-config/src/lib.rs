// mergepart-config - Settings for the part writer and its CLI
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from MERGEPART_CONFIG env var
// 3. Config file contents from MERGEPART_CONFIG_CONTENT env var
// 4. Default config file location (./mergepart.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod codec;
mod env_overrides;
mod sources;
mod validation;

pub use codec::{CodecParseError, CompressionCodec, DEFAULT_ZSTD_LEVEL};
pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};
pub use sources::{load_config, load_from_file_path};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergePartConfig {
    #[serde(default)]
    pub writer: WriterSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings that shape how a part is laid out on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Maximum rows per granule.
    pub index_granularity: usize,
    /// Approximate byte budget per granule; 0 disables adaptive granularity.
    pub index_granularity_bytes: usize,
    /// Share of default values at which a column is marked sparse.
    pub ratio_of_defaults_for_sparse_serialization: f64,
    /// Drop columns that hold only default values after writing.
    pub remove_empty_columns: bool,
    /// Sync the part directory itself when a part is finished with sync.
    pub fsync_part_directory: bool,
    /// Codec used for column data and recorded in the part.
    pub default_codec: CompressionCodec,
    /// Target size of Parquet data pages inside column files.
    pub data_page_size_bytes: usize,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            index_granularity: 8192,
            index_granularity_bytes: 10 * 1024 * 1024,
            ratio_of_defaults_for_sparse_serialization: 0.9375,
            remove_empty_columns: true,
            fsync_part_directory: false,
            default_codec: CompressionCodec::Lz4,
            data_page_size_bytes: 1024 * 1024,
        }
    }
}

impl WriterSettings {
    pub fn is_adaptive_granularity(&self) -> bool {
        self.index_granularity_bytes > 0
    }
}

/// Logging configuration for the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl MergePartConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Parse a TOML document on top of the defaults without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MergePartConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let writer = WriterSettings::default();
        assert_eq!(writer.index_granularity, 8192);
        assert!(writer.is_adaptive_granularity());
        assert!(writer.remove_empty_columns);
        assert_eq!(writer.default_codec, CompressionCodec::Lz4);

        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, LogFormat::Text);
    }

    #[test]
    fn test_from_toml_str_fills_defaults() {
        let config = MergePartConfig::from_toml_str(
            r#"
            [writer]
            index_granularity = 1024
            default_codec = "zstd(3)"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.writer.index_granularity, 1024);
        assert_eq!(config.writer.default_codec, CompressionCodec::Zstd(3));
        assert_eq!(config.writer.ratio_of_defaults_for_sparse_serialization, 0.9375);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_toml_str_rejects_bad_codec() {
        let result = MergePartConfig::from_toml_str(
            r#"
            [writer]
            default_codec = "brotli"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
