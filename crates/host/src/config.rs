//! Configuration management for the FileHost server.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/filehost/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use identity::{StorageMode, StoreLocation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the ownership registry file inside the files directory.
pub const REGISTRY_FILE_NAME: &str = ".fileinfo.json";

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must be greater than 0")]
    InvalidPort,

    #[error("host must not be empty")]
    EmptyHost,

    #[error("max_size must be greater than 0, got {0}")]
    InvalidMaxSize(u64),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("{0} must not be empty")]
    EmptyPath(&'static str),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the FileHost server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP listener and logging.
    pub server: ServerConfig,

    /// Uploaded file storage.
    pub files: FilesConfig,

    /// User account backend.
    pub identity: IdentityConfig,
}

/// HTTP listener and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for daily-rolling log files. Logs go to stdout only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Uploaded file storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory holding uploaded files and the ownership registry.
    pub dir: PathBuf,

    /// Maximum size of an uploaded or saved file in bytes (default: 100MB).
    pub max_size: u64,
}

/// User account backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Which backend holds user accounts.
    pub storage_mode: StorageMode,

    /// JSON user file, used when `storage_mode = "json"`.
    pub user_file: PathBuf,

    /// SQLite database, used when `storage_mode = "sqlite"`.
    pub database: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("files"),
            max_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::Json,
            user_file: PathBuf::from("users.json"),
            database: PathBuf::from("users.db"),
        }
    }
}

impl FilesConfig {
    /// Path of the ownership registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE_NAME)
    }
}

impl IdentityConfig {
    /// Resolves the selected backend and its path.
    pub fn location(&self) -> StoreLocation {
        match self.storage_mode {
            StorageMode::Json => StoreLocation::Json(self.user_file.clone()),
            StorageMode::Sqlite => StoreLocation::Sqlite(self.database.clone()),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filehost")
        .join("config.toml")
}

impl Config {
    /// The `host:port` string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEHOST_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - FILEHOST_STORAGE_MODE: Override identity backend (json, sqlite)
    /// - FILEHOST_PORT: Override listen port
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("FILEHOST_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.server.log_level = level;
            }
        }

        if let Ok(mode) = std::env::var("FILEHOST_STORAGE_MODE") {
            if !mode.is_empty() {
                match mode.parse::<StorageMode>() {
                    Ok(mode) => {
                        tracing::info!("Overriding storage_mode from environment: {}", mode);
                        self.identity.storage_mode = mode;
                    }
                    Err(e) => tracing::warn!("Ignoring FILEHOST_STORAGE_MODE: {}", e),
                }
            }
        }

        if let Ok(port) = std::env::var("FILEHOST_PORT") {
            if !port.is_empty() {
                match port.parse::<u16>() {
                    Ok(port) => {
                        tracing::info!("Overriding port from environment: {}", port);
                        self.server.port = port;
                    }
                    Err(e) => tracing::warn!("Ignoring FILEHOST_PORT {:?}: {}", port, e),
                }
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.server.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        if self.files.max_size == 0 {
            return Err(ConfigError::InvalidMaxSize(self.files.max_size));
        }

        if self.files.dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("files.dir"));
        }

        match self.identity.storage_mode {
            StorageMode::Json if self.identity.user_file.as_os_str().is_empty() => {
                return Err(ConfigError::EmptyPath("identity.user_file"));
            }
            StorageMode::Sqlite if self.identity.database.as_os_str().is_empty() => {
                return Err(ConfigError::EmptyPath("identity.database"));
            }
            _ => {}
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
