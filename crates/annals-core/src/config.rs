//! Configuration for annals
//!
//! Centralized configuration for the database location, the upload area,
//! the listening address and first-run bootstrap.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Extensions accepted by the media store unless configured otherwise
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// System-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnalsConfig {
    /// SQLite settings
    pub database: DatabaseConfig,
    /// Upload area settings
    pub media: MediaConfig,
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Default account created on an empty user table
    pub bootstrap: BootstrapConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("events.db"),
        }
    }
}

/// Upload area configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory uploads are written to
    pub upload_dir: PathBuf,
    /// Prefix of the stored references handed back to callers
    pub url_prefix: String,
    /// Lower-case extensions accepted for upload
    pub allowed_extensions: Vec<String>,
    /// Upper bound on a request body carrying uploads
    pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("static/uploads"),
            url_prefix: "/static/uploads".to_string(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_upload_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5000".to_string(),
        }
    }
}

/// First-run account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
        }
    }
}

impl AnnalsConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.media.url_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "media.url_prefix must start with '/'".to_string(),
            ));
        }

        if self.media.url_prefix.ends_with('/') {
            return Err(ConfigError::InvalidValue(
                "media.url_prefix must name a directory and not end with '/'".to_string(),
            ));
        }

        if self.media.allowed_extensions.is_empty() {
            return Err(ConfigError::MissingField(
                "media.allowed_extensions".to_string(),
            ));
        }

        if let Some(ext) = self
            .media
            .allowed_extensions
            .iter()
            .find(|e| e.is_empty() || e.contains('.') || e.to_lowercase() != **e)
        {
            return Err(ConfigError::InvalidValue(format!(
                "allowed extension {:?} must be a lower-case suffix without '.'",
                ext
            )));
        }

        if self.media.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "media.max_upload_bytes must be positive".to_string(),
            ));
        }

        if self.bootstrap.admin_username.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "bootstrap.admin_username".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Value is not usable
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// Required field is missing
    #[error("Missing field: {0}")]
    MissingField(String),
}
