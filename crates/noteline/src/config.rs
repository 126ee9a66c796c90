//! Configuration management for noteline.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "noteline";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "notes.db";

/// Default image directory name inside the data directory.
const IMAGE_DIR_NAME: &str = "images";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NOTELINE_`, sections separated by `__`)
/// 2. TOML config file at `~/.config/noteline/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document store configuration.
    pub store: StoreConfig,
    /// Image blob configuration.
    pub blobs: BlobConfig,
}

/// Which document store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Volatile in-process store; contents vanish on exit.
    Memory,
    /// `SQLite` database on disk.
    #[default]
    Sqlite,
}

/// Document store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to open.
    pub backend: StoreBackend,
    /// Path to the database file.
    /// Defaults to `~/.local/share/noteline/notes.db`
    pub database_path: Option<PathBuf>,
    /// Upper bound on a single store request, in milliseconds.
    pub request_timeout_ms: u64,
}

/// Image blob configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Directory that receives copied images.
    /// Defaults to `~/.local/share/noteline/images`
    pub directory: Option<PathBuf>,
    /// File extension given to stored images.
    pub extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_path: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            directory: None,
            extension: "jpg".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("NOTELINE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.store.request_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_ms must be greater than 0".to_string(),
            });
        }

        let extension = &self.blobs.extension;
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::ConfigValidation {
                message: format!("invalid image extension: '{extension}'"),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the image directory, resolving defaults if not set.
    #[must_use]
    pub fn image_dir(&self) -> PathBuf {
        self.blobs
            .directory
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(IMAGE_DIR_NAME))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.store.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(config.store.database_path.is_none());
        assert_eq!(config.store.request_timeout_ms, 10_000);
        assert!(config.blobs.directory.is_none());
        assert_eq!(config.blobs.extension, "jpg");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.store.request_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_ms"));
    }

    #[test]
    fn test_validate_bad_extension() {
        let mut config = Config::default();

        config.blobs.extension = String::new();
        assert!(config.validate().is_err());

        config.blobs.extension = "../jpg".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid image extension"));

        config.blobs.extension = "png".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("notes.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.store.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_image_dir_default() {
        let path = Config::default().image_dir();
        assert!(path.to_string_lossy().contains("noteline"));
        assert!(path.ends_with("images"));
    }

    #[test]
    fn test_request_timeout() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("noteline"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(
            &file,
            "[store]\nbackend = \"memory\"\nrequest_timeout_ms = 250\n\n[blobs]\nextension = \"png\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(file)).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.blobs.extension, "png");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "[store]\nrequest_timeout_ms = 0\n").unwrap();

        assert!(Config::load_from(Some(file)).is_err());
    }

    #[test]
    fn test_backend_serialization() {
        let json = serde_json::to_string(&StoreBackend::Memory).unwrap();
        assert_eq!(json, "\"memory\"");
        let backend: StoreBackend = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(backend, StoreBackend::Sqlite);
    }

    #[test]
    fn test_store_config_deserialize() {
        let json = r#"{"request_timeout_ms": 500}"#;
        let store: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(store.request_timeout_ms, 500);
        assert_eq!(store.backend, StoreBackend::Sqlite);
    }
}
