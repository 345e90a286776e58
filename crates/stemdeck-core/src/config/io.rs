//! Config and preset-bundle file I/O
//!
//! Files are YAML unless the extension says `.json`. Loading never fails:
//! a missing or unreadable file yields `T::default()` and a log line, so a
//! broken config can't keep the engine from starting.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// On-disk encoding, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }

    fn parse<T: DeserializeOwned>(self, contents: &str) -> Result<T> {
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str(contents).context("Invalid YAML"),
            ConfigFormat::Json => serde_json::from_str(contents).context("Invalid JSON"),
        }
    }

    fn render<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            ConfigFormat::Yaml => serde_yaml::to_string(value).context("Failed to serialize to YAML"),
            ConfigFormat::Json => {
                serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
            }
        }
    }
}

/// Load a config (or preset bundle) from disk, falling back to defaults
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    let format = ConfigFormat::from_path(path);
    let loaded = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))
        .and_then(|contents| format.parse::<T>(&contents));

    match loaded {
        Ok(config) => {
            log::info!("load_config: Loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Save a config (or preset bundle), creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let contents = ConfigFormat::from_path(path).render(config)?;
    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))?;

    log::info!("save_config: Saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(&PathBuf::from("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(&PathBuf::from("a.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(&PathBuf::from("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(&PathBuf::from("noext")), ConfigFormat::Yaml);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: EngineConfig = load_config(Path::new("/nonexistent/stemdeck/engine.yaml"));
        assert_eq!(config.sample_rate, EngineConfig::default().sample_rate);
    }

    #[test]
    fn test_engine_config_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.yaml");

        let mut config = EngineConfig::default();
        config.block_frames = 256;
        config.pool.max_memory_bytes = 64 * 1024 * 1024;
        config.automation.resolution_hz = 120.0;

        save_config(&config, &path).unwrap();
        let loaded: EngineConfig = load_config(&path);

        assert_eq!(loaded.block_frames, 256);
        assert_eq!(loaded.pool.max_memory_bytes, 64 * 1024 * 1024);
        assert!((loaded.automation.resolution_hz - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.looping = false;
        save_config(&config, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('{'));

        let loaded: EngineConfig = load_config(&path);
        assert!(!loaded.looping);
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "sample_rate: [not, a, number]").unwrap();

        let loaded: EngineConfig = load_config(&path);
        assert_eq!(loaded.sample_rate, EngineConfig::default().sample_rate);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "block_frames: 64\npool:\n  min_access_count: 9\n").unwrap();

        let loaded: EngineConfig = load_config(&path);
        assert_eq!(loaded.block_frames, 64);
        assert_eq!(loaded.pool.min_access_count, 9);
        assert_eq!(loaded.stem_count, EngineConfig::default().stem_count);
    }
}
