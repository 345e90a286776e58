//! Standard locations for stemdeck configuration files

use std::path::PathBuf;

/// Directory holding engine config and saved preset bundles
///
/// Returns: `<platform config dir>/stemdeck`, falling back to `./stemdeck`
/// when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemdeck")
}

/// Path of a named file inside the config directory
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_app_name() {
        assert!(default_config_dir().ends_with("stemdeck"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("engine.yaml");
        assert!(path.ends_with("stemdeck/engine.yaml"));
    }
}
