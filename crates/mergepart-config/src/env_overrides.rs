use super::{LogFormat, MergePartConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "MERGEPART_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut MergePartConfig, env: &E) -> Result<()> {
    // Granularity
    if let Some(val) = get_env_usize(env, "INDEX_GRANULARITY")? {
        config.writer.index_granularity = val;
    }
    if let Some(val) = get_env_usize(env, "INDEX_GRANULARITY_BYTES")? {
        config.writer.index_granularity_bytes = val;
    }

    // Serialization
    if let Some(val) = get_env_f64(env, "RATIO_OF_DEFAULTS_FOR_SPARSE_SERIALIZATION")? {
        config.writer.ratio_of_defaults_for_sparse_serialization = val;
    }
    if let Some(val) = get_env_bool(env, "REMOVE_EMPTY_COLUMNS")? {
        config.writer.remove_empty_columns = val;
    }

    // Durability and encoding
    if let Some(val) = get_env_bool(env, "FSYNC_PART_DIRECTORY")? {
        config.writer.fsync_part_directory = val;
    }
    if let Some(codec) = get_env_string(env, "DEFAULT_CODEC") {
        config.writer.default_codec = codec
            .parse()
            .context("Invalid MERGEPART_DEFAULT_CODEC value")?;
    }
    if let Some(val) = get_env_usize(env, "DATA_PAGE_SIZE_BYTES")? {
        config.writer.data_page_size_bytes = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = format
            .parse::<LogFormat>()
            .context("Invalid MERGEPART_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_f64<E: EnvSource>(env: &E, key: &str) -> Result<Option<f64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<f64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
