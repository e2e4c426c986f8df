//! Config file read/write.

use crate::schema::SwitchboardConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the Switchboard config directory.
/// Priority: `SWITCHBOARD_CONFIG_DIR` env > `~/.switchboard/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SWITCHBOARD_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".switchboard"))
        .unwrap_or_else(|| PathBuf::from(".switchboard"))
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Returns the defaults if the file doesn't exist.
pub async fn load_config(path: &Path) -> Result<SwitchboardConfig> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(SwitchboardConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw).with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse config YAML. Blank input yields the defaults.
pub fn parse_config(raw: &str) -> Result<SwitchboardConfig> {
    if raw.trim().is_empty() {
        return Ok(SwitchboardConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

/// Write config to disk atomically (temp file, then rename), keeping the
/// previous file as `config.yaml.bak`.
pub async fn write_config(config: &SwitchboardConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    if fs::try_exists(path).await.unwrap_or(false) {
        let bak = path.with_extension("yaml.bak");
        if let Err(e) = fs::copy(path, &bak).await {
            warn!(backup = %bak.display(), error = %e, "Failed to back up config");
        }
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.yaml")).await.unwrap();
        assert_eq!(config, SwitchboardConfig::default());
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());

        let mut config = SwitchboardConfig::default();
        config.prefix = "?".into();
        config.register_commands.guilds = vec!["g1".into()];
        write_config(&config, &path).await.unwrap();
        assert_eq!(load_config(&path).await.unwrap(), config);

        config.prefix = "$".into();
        write_config(&config, &path).await.unwrap();
        assert!(path.with_extension("yaml.bak").exists());
        assert_eq!(load_config(&path).await.unwrap().prefix, "$");
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "prefix: [unterminated").await.unwrap();
        assert!(load_config(&path).await.is_err());
    }

    #[test]
    fn test_blank_input_is_default() {
        assert_eq!(parse_config("  \n").unwrap(), SwitchboardConfig::default());
    }
}
