//! Configuration module for imgshelf.

use serde::Deserialize;
use std::path::Path;

use crate::imaging::DerivativeConfig;
use crate::{Result, ShelfError};

/// Web server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the HTTP API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret key.
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Serve the local uploads root under `/uploads`.
    #[serde(default = "default_serve_uploads")]
    pub serve_uploads: bool,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    5000
}

fn default_jwt_access_expiry() -> u64 {
    86400 // 1 day
}

fn default_serve_uploads() -> bool {
    true
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            serve_uploads: default_serve_uploads(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/imgshelf.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Which storage backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Files under a local uploads root.
    #[default]
    Local,
    /// S3 compatible object storage.
    S3,
}

/// S3 bucket settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct S3Config {
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
    /// AWS region (falls back to the SDK's environment chain when empty).
    #[serde(default)]
    pub region: String,
    /// Custom endpoint for S3 compatible services.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Use path-style addressing.
    #[serde(default)]
    pub force_path_style: bool,
    /// Public base URL for objects. Defaults to the virtual-hosted bucket URL.
    #[serde(default)]
    pub public_url: Option<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Active backend.
    #[serde(default)]
    pub backend: StorageKind,
    /// Uploads root for the local backend.
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Public origin used to build URLs for locally stored files.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// S3 settings, used when `backend = "s3"`.
    #[serde(default)]
    pub s3: S3Config,
}

fn default_local_path() -> String {
    "data/uploads".to_string()
}

fn default_public_url() -> String {
    "http://localhost:5000/uploads".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Local,
            local_path: default_local_path(),
            public_url: default_public_url(),
            s3: S3Config::default(),
        }
    }
}

/// Upload handling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory for spooled multipart parts. System temp dir when unset.
    #[serde(default)]
    pub temp_dir: Option<String>,
    /// Maximum number of files accepted in one request.
    #[serde(default = "default_max_files")]
    pub max_files_per_request: usize,
    /// Hard limit on the multipart request body.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Per-file limit seeded into the settings table on first start.
    #[serde(default = "default_max_upload_size")]
    pub default_max_upload_size: i64,
    /// Quota given to newly registered users.
    #[serde(default = "default_storage_limit")]
    pub default_storage_limit: i64,
}

fn default_max_files() -> usize {
    10
}

fn default_max_request_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_max_upload_size() -> i64 {
    5 * 1024 * 1024
}

fn default_storage_limit() -> i64 {
    5 * 1024 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            max_files_per_request: default_max_files(),
            max_request_bytes: default_max_request_bytes(),
            default_max_upload_size: default_max_upload_size(),
            default_storage_limit: default_storage_limit(),
        }
    }
}

/// Derivative generation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagingConfig {
    /// Edge of the square thumbnail in pixels.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
    /// JPEG quality for thumbnails.
    #[serde(default = "default_thumbnail_quality")]
    pub thumbnail_quality: u8,
    /// Longest edge of the preview in pixels.
    #[serde(default = "default_preview_max_edge")]
    pub preview_max_edge: u32,
    /// JPEG quality for previews.
    #[serde(default = "default_preview_quality")]
    pub preview_quality: u8,
    /// JPEG quality for transcoded originals.
    #[serde(default = "default_normalize_quality")]
    pub normalize_quality: u8,
}

fn default_thumbnail_size() -> u32 {
    300
}

fn default_thumbnail_quality() -> u8 {
    80
}

fn default_preview_max_edge() -> u32 {
    1920
}

fn default_preview_quality() -> u8 {
    85
}

fn default_normalize_quality() -> u8 {
    90
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: default_thumbnail_size(),
            thumbnail_quality: default_thumbnail_quality(),
            preview_max_edge: default_preview_max_edge(),
            preview_quality: default_preview_quality(),
            normalize_quality: default_normalize_quality(),
        }
    }
}

impl ImagingConfig {
    /// Derivative settings for the generator.
    pub fn derivative_config(&self) -> DerivativeConfig {
        DerivativeConfig {
            thumbnail_size: self.thumbnail_size,
            thumbnail_quality: self.thumbnail_quality,
            preview_max_edge: self.preview_max_edge,
            preview_quality: self.preview_quality,
            normalize_quality: self.normalize_quality,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, written in addition to stdout.
    #[serde(default)]
    pub file: Option<String>,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            format: LogFormat::Text,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Web server configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload handling configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Derivative generation configuration.
    #[serde(default)]
    pub imaging: ImagingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ShelfError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ShelfError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `IMGSHELF_JWT_SECRET`: Override the JWT secret key
    /// - `IMGSHELF_DATABASE_PATH`: Override the database path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("IMGSHELF_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.web.jwt_secret = jwt_secret;
            }
        }
        if let Ok(path) = std::env::var("IMGSHELF_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.web.jwt_secret.is_empty() {
            return Err(ShelfError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via IMGSHELF_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.storage.backend == StorageKind::S3 && self.storage.s3.bucket.is_empty() {
            return Err(ShelfError::Config(
                "storage.backend is \"s3\" but storage.s3.bucket is empty".to_string(),
            ));
        }
        if self.imaging.thumbnail_size == 0 || self.imaging.preview_max_edge == 0 {
            return Err(ShelfError::Config(
                "imaging sizes must be greater than zero".to_string(),
            ));
        }
        for (name, quality) in [
            ("thumbnail_quality", self.imaging.thumbnail_quality),
            ("preview_quality", self.imaging.preview_quality),
            ("normalize_quality", self.imaging.normalize_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ShelfError::Config(format!(
                    "imaging.{name} must be between 1 and 100"
                )));
            }
        }
        if self.upload.max_files_per_request == 0 {
            return Err(ShelfError::Config(
                "upload.max_files_per_request must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
