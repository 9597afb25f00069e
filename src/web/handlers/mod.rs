//! API handlers.

pub mod admin;
pub mod archive;
pub mod auth;
pub mod folders;
pub mod images;
pub mod settings;
pub mod user;

pub use admin::*;
pub use archive::*;
pub use auth::*;
pub use folders::*;
pub use images::*;
pub use settings::*;
pub use user::*;

use std::path::PathBuf;

use jsonwebtoken::{encode, EncodingKey, Header};

use crate::config::Config;
use crate::db::User;
use crate::imaging::DerivativeConfig;
use crate::storage::SharedStorage;
use crate::web::error::ApiError;
use crate::web::middleware::JwtClaims;
use crate::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database pool.
    pub db: Database,
    /// Storage backend for image renditions.
    pub storage: SharedStorage,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
    /// Directory for spooled upload files (system temp dir if None).
    pub temp_dir: Option<PathBuf>,
    /// Maximum number of files in one upload request.
    pub max_files_per_request: usize,
    /// Quota given to newly registered users.
    pub default_storage_limit: i64,
    /// Rendition sizes and qualities.
    pub derivatives: DerivativeConfig,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, storage: SharedStorage, config: &Config) -> Self {
        Self {
            db,
            storage,
            encoding_key: EncodingKey::from_secret(config.web.jwt_secret.as_bytes()),
            access_token_expiry: config.web.jwt_access_token_expiry_secs,
            temp_dir: config.upload.temp_dir.as_ref().map(PathBuf::from),
            max_files_per_request: config.upload.max_files_per_request,
            default_storage_limit: config.upload.default_storage_limit,
            derivatives: config.imaging.derivative_config(),
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role.to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }
}
