//! Configuration module for the upload signer
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Longest expiry SigV4 allows for a presigned URL (7 days)
pub const MAX_EXPIRATION_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Route middleware understood by the server
pub const KNOWN_MIDDLEWARE: &[&str] = &["trace", "cors"];

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.bucket cannot be empty".into(),
            ));
        }

        if self.storage.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.region cannot be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.storage.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(
                    "Invalid storage endpoint: must start with http:// or https://".into(),
                ));
            }
        }

        if let Some(ref base) = self.storage.temporary_url {
            if !is_valid_http_url(base) {
                return Err(ConfigError::ValidationError(
                    "Invalid temporary_url: must start with http:// or https://".into(),
                ));
            }
        }

        if self.storage.access_key.is_some() != self.storage.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "storage.access_key and storage.secret_key must be set together".into(),
            ));
        }

        if self.upload.expiration_seconds == 0
            || self.upload.expiration_seconds > MAX_EXPIRATION_SECONDS
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid expiration_seconds {}: must be between 1 and {}",
                self.upload.expiration_seconds, MAX_EXPIRATION_SECONDS
            )));
        }

        for name in &self.routes.middleware {
            if !KNOWN_MIDDLEWARE.contains(&name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown middleware '{}': must be one of {}",
                    name,
                    KNOWN_MIDDLEWARE.join(", ")
                )));
            }
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
}

/// Storage disk configuration
///
/// Describes the S3 (or S3-compatible) bucket the service signs uploads for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Logical disk name, only used for logging
    #[serde(default = "default_disk")]
    pub disk: String,
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Prefix applied to every object key sent to the provider
    #[serde(default)]
    pub root: Option<String>,
    /// Base URL that replaces scheme and authority of generated links
    #[serde(default)]
    pub temporary_url: Option<String>,
}

fn default_disk() -> String {
    "s3".to_string()
}

/// Upload signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// How long each signed link stays valid. Default: 900 (15 minutes)
    #[serde(default = "default_expiration_seconds")]
    pub expiration_seconds: u64,

    /// Attach `x-amz-meta-*` entries to signed single-request URLs.
    /// Some S3-compatible providers reject signed URLs carrying metadata.
    #[serde(default = "default_allow_metadata")]
    pub allow_metadata: bool,

    /// Canned ACL applied to new objects, e.g. "public-read"
    #[serde(default)]
    pub acl: Option<String>,
}

impl UploadConfig {
    /// Expiration as a `Duration`
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_seconds)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            expiration_seconds: default_expiration_seconds(),
            allow_metadata: default_allow_metadata(),
            acl: None,
        }
    }
}

fn default_expiration_seconds() -> u64 {
    900 // 15 minutes
}

fn default_allow_metadata() -> bool {
    true
}

/// Route registration configuration
///
/// # Example
///
/// ```yaml
/// routes:
///   name: "uppy."
///   prefix: "uppy"
///   middleware: ["trace", "cors"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    /// Prefix for route names used in logs and metrics
    #[serde(default = "default_route_name")]
    pub name: String,

    /// Path prefix all endpoints are mounted under
    #[serde(default = "default_route_prefix")]
    pub prefix: String,

    /// Middleware applied to every route, outermost first
    #[serde(default = "default_middleware")]
    pub middleware: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            name: default_route_name(),
            prefix: default_route_prefix(),
            middleware: default_middleware(),
        }
    }
}

fn default_route_name() -> String {
    "uppy.".to_string()
}

fn default_route_prefix() -> String {
    "uppy".to_string()
}

fn default_middleware() -> Vec<String> {
    vec!["trace".to_string(), "cors".to_string()]
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}
