// Configuration validation
//
// Validates that values are present and sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &MergePartConfig) -> Result<()> {
    validate_writer_settings(&config.writer)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_writer_settings(settings: &WriterSettings) -> Result<()> {
    if settings.index_granularity == 0 {
        bail!("writer.index_granularity must be greater than 0");
    }

    let ratio = settings.ratio_of_defaults_for_sparse_serialization;
    if !(0.0..=1.0).contains(&ratio) {
        bail!(
            "writer.ratio_of_defaults_for_sparse_serialization must be within [0, 1], got {}",
            ratio
        );
    }

    if settings.data_page_size_bytes == 0 {
        bail!("writer.data_page_size_bytes must be greater than 0");
    }

    if settings.index_granularity > 1_000_000 {
        warn!(
            index_granularity = settings.index_granularity,
            "writer.index_granularity is very large; granules are buffered in memory"
        );
    }

    if settings.is_adaptive_granularity() && settings.index_granularity_bytes < 1024 {
        warn!(
            index_granularity_bytes = settings.index_granularity_bytes,
            "writer.index_granularity_bytes is tiny; expect one row per granule"
        );
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("logging.level must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_writer_settings() {
        assert!(validate_writer_settings(&WriterSettings::default()).is_ok());

        let zero_granularity = WriterSettings {
            index_granularity: 0,
            ..Default::default()
        };
        assert!(validate_writer_settings(&zero_granularity).is_err());

        let bad_ratio = WriterSettings {
            ratio_of_defaults_for_sparse_serialization: 1.5,
            ..Default::default()
        };
        assert!(validate_writer_settings(&bad_ratio).is_err());
    }

    #[test]
    fn test_validate_logging_config() {
        let empty_level = LoggingConfig {
            level: "  ".to_string(),
            format: LogFormat::Text,
        };
        assert!(validate_logging_config(&empty_level).is_err());
    }
}
