//! Configuration file handling for hark

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::install::listener::DEFAULT_PORT;

const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Unknown working directory: {0}")]
    UnknownWorkingDirectory(String),
    #[error("Unable to determine the home directory")]
    UnknownHomeDirectory,
    #[error("Unable to parse YAML config file {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON config file {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Configuration file as written on disk
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub port: Option<u16>,
    pub extension_dir: Option<PathBuf>,
    pub tick_interval_ms: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
    pub listen: Option<bool>,
}

/// Resolved launcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Loopback port of the install listener. `0` picks a free port.
    pub port: u16,
    /// Directory holding installed extensions.
    pub extension_dir: PathBuf,
    /// How often the install queue is drained.
    pub tick_interval: Duration,
    /// Timeout for fetching an extension.
    pub fetch_timeout: Duration,
    /// Whether the interactive loop starts the install listener.
    pub listen: bool,
}

/// Default store location, `~/.hark/commands`.
///
/// # Errors
///
/// Returns `ConfigError::UnknownHomeDirectory` if there is no home directory.
pub fn default_extension_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::UnknownHomeDirectory)?;
    Ok(home.join(".hark").join("commands"))
}

fn expand_home(path: PathBuf) -> Result<PathBuf, ConfigError> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .ok_or(ConfigError::UnknownHomeDirectory)?
            .join(rest)),
        Err(_) => Ok(path),
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = ConfigError;

    fn try_from(config: ConfigFile) -> Result<Self, Self::Error> {
        let tick_interval_ms = config.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        if tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        let fetch_timeout_secs = config
            .fetch_timeout_secs
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        if fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        let extension_dir = match config.extension_dir {
            Some(dir) if dir.as_os_str().is_empty() => {
                return Err(ConfigError::Validation(
                    "extension_dir must not be empty".to_string(),
                ));
            }
            Some(dir) => expand_home(dir)?,
            None => default_extension_dir()?,
        };
        Ok(Config {
            port: config.port.unwrap_or(DEFAULT_PORT),
            extension_dir,
            tick_interval: Duration::from_millis(tick_interval_ms),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            listen: config.listen.unwrap_or(true),
        })
    }
}

/// List of supported configuration file names
const FILENAMES: [&str; 3] = [".hark.yaml", ".hark.yml", ".hark.json"];

impl ConfigFile {
    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file cannot be read, or
    /// `ConfigError::Yaml`/`ConfigError::Json` if parsing fails.
    pub fn from_file(file: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = std::fs::read_to_string(file)
            .map_err(|_| ConfigError::ConfigNotFound(file.to_path_buf()))?;
        let config: ConfigFile = if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })?
        } else if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })?
        };
        Ok(config)
    }

    /// Searches `start` and its parents, then `home`, for a configuration file.
    #[must_use]
    pub fn find_from(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
        debug!("Searching for config file in {}", start.display());
        let mut path = start.to_path_buf();
        loop {
            if let Some(found) = Self::find_in(&path) {
                return Some(found);
            }
            if !path.pop() {
                break;
            }
        }
        home.and_then(Self::find_in)
    }

    fn find_in(dir: &Path) -> Option<PathBuf> {
        FILENAMES.iter().map(|file| dir.join(file)).find(|path| {
            let exists = path.is_file();
            if exists {
                info!("Found config file: {}", path.display());
            }
            exists
        })
    }

    /// Searches for a configuration file in the current directory, its parents
    /// and the home directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownWorkingDirectory` if the cwd cannot be determined.
    pub fn find_config() -> Result<Option<PathBuf>, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
        Ok(Self::find_from(&cwd, dirs::home_dir().as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".hark.json");
        std::fs::write(&path, r#"{"port": 4000, "listen": false}"#).unwrap();
        let config = ConfigFile::from_file(&path).unwrap();
        assert_eq!(config.port, Some(4000));
        assert_eq!(config.listen, Some(false));
    }

    #[test]
    fn test_from_file_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".hark.yaml");
        std::fs::write(&path, "extension_dir: cmds\ntick_interval_ms: 250\n").unwrap();
        let config: Config = ConfigFile::from_file(&path).unwrap().try_into().unwrap();
        assert_eq!(config.extension_dir, PathBuf::from("cmds"));
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.listen);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".hark.yml");
        std::fs::write(&path, "\n").unwrap();
        let config = ConfigFile::from_file(&path).unwrap();
        assert!(config.port.is_none());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".hark.yaml");
        std::fs::write(&path, "prot: 4000\n").unwrap();
        match ConfigFile::from_file(&path) {
            Err(ConfigError::Yaml { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected ConfigError::Yaml, got: {other:?}"),
        }
    }

    #[test]
    fn test_zero_tick_interval_is_rejected() {
        let raw = ConfigFile {
            tick_interval_ms: Some(0),
            extension_dir: Some(PathBuf::from("/tmp/hark")),
            ..ConfigFile::default()
        };
        assert!(matches!(
            Config::try_from(raw),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_find_searches_parents_then_home() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(".hark.json"), "{}").unwrap();

        assert_eq!(
            ConfigFile::find_from(&nested, Some(home.path())),
            Some(home.path().join(".hark.json"))
        );

        std::fs::write(root.path().join("a").join(".hark.yml"), "").unwrap();
        assert_eq!(
            ConfigFile::find_from(&nested, Some(home.path())),
            Some(root.path().join("a").join(".hark.yml"))
        );
    }
}
