//! Core implementation of the hark command launcher
//!
//! hark resolves short typed strings against a registry of command factories
//! and runs the resulting command. New commands can be installed while the
//! launcher runs: a loopback HTTP listener accepts extension URLs, and the
//! main context fetches, validates, stores and registers them one per tick.

use std::path::PathBuf;

use log::{debug, info};

use crate::config_file::{Config, ConfigError, ConfigFile};

pub mod adapter;
pub mod builtin;
pub mod commands;
pub mod config_file;
pub mod extension;
pub mod install;
pub mod launcher;
pub mod logger;
pub mod messages;
pub mod store;

/// Load configuration from a file (or auto-detect), falling back to defaults
/// when no file is found.
///
/// A relative `extension_dir` is resolved against the config file's directory.
///
/// # Errors
///
/// Returns `ConfigError` if an explicit config file does not exist, or a
/// config file cannot be parsed or contains invalid values.
pub fn load_config(config_file: Option<&str>) -> Result<Config, ConfigError> {
    let config_path = match config_file {
        Some(file) => {
            let config_path = PathBuf::from(file);
            if !config_path.exists() {
                return Err(ConfigError::ConfigNotFound(config_path));
            }
            Some(config_path)
        }
        None => ConfigFile::find_config()?,
    };
    let Some(config_path) = config_path else {
        info!("No config file found, using defaults");
        return ConfigFile::default().try_into();
    };

    let base = config_path
        .parent()
        .ok_or_else(|| ConfigError::ConfigNotFound(config_path.clone()))?
        .to_path_buf();
    debug!(
        "Loading config file: {} (base: {})",
        config_path.display(),
        base.display()
    );
    let mut config: Config = ConfigFile::from_file(&config_path)?.try_into()?;
    config.extension_dir = base.join(&config.extension_dir);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_extension_dir_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "extension_dir: cmds\nport: 0\n").unwrap();
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.extension_dir, dir.path().join("cmds"));
        assert_eq!(config.port, 0);
    }

    #[test]
    fn test_missing_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(matches!(
            load_config(path.to_str()),
            Err(ConfigError::ConfigNotFound(p)) if p == path
        ));
    }
}
