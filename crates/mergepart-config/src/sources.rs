// Configuration source loading.
//
// Priority order:
// 1. Environment variables (MERGEPART_* prefix)
// 2. Config file path from MERGEPART_CONFIG
// 3. Inline config content from MERGEPART_CONFIG_CONTENT
// 4. Default config file (./mergepart.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::MergePartConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "./mergepart.toml";

/// Load configuration using native environment/file access.
pub fn load_config() -> Result<MergePartConfig> {
    let mut config = load_from_file()?.unwrap_or_default();

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<MergePartConfig>> {
    if let Ok(path) = env::var("MERGEPART_CONFIG") {
        return read_config_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var("MERGEPART_CONFIG_CONTENT") {
        let config: MergePartConfig = toml::from_str(&content)
            .context("Failed to parse inline config from MERGEPART_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return read_config_file(default_path).map(Some);
    }

    Ok(None)
}

/// Load configuration from a specific file path (for the CLI --config flag).
/// Environment overrides are applied on top of the file content.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<MergePartConfig> {
    let mut config = read_config_file(path.as_ref())?;

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<MergePartConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[writer]\nindex_granularity = 4096\nfsync_part_directory = true").unwrap();

        let config = load_from_file_path(file.path()).unwrap();
        assert_eq!(config.writer.index_granularity, 4096);
        assert!(config.writer.fsync_part_directory);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        assert!(load_from_file_path("/definitely/not/here/mergepart.toml").is_err());
    }
}
