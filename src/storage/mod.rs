//! Storage backends for image renditions.
//!
//! Exactly one backend is active per deployment. Everything above this
//! module talks to [`StorageBackend`] only, so the upload, deletion and
//! archive paths do not know whether bytes end up on disk or in a bucket.

mod keys;
mod local;
mod s3;

pub use keys::{folder_prefix, sanitize_stem, validate_key, RenditionKeys};
pub use local::LocalStorage;
pub use s3::S3Storage;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;
use tracing::info;

use crate::config::{StorageConfig, StorageKind};
use crate::Result;

/// Readable body of a stored object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Shared handle to the active backend.
pub type SharedStorage = Arc<dyn StorageBackend>;

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Key the object was written under.
    pub key: String,
    /// Public retrieval URL.
    pub url: String,
    /// Bytes written.
    pub size: i64,
}

/// Persists renditions under keys and hands back retrieval locators.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Write `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<StoredObject>;

    /// Remove the object under `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Open the object for reading, `None` when it does not exist.
    async fn open(&self, key: &str) -> Result<Option<ObjectReader>>;

    /// Remove the container for `prefix` if it no longer holds anything.
    ///
    /// Returns true when something was removed. Backends without
    /// directories have nothing to prune.
    async fn prune_prefix(&self, _prefix: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Build the backend selected in the configuration.
pub async fn build_backend(config: &StorageConfig) -> Result<SharedStorage> {
    let backend: SharedStorage = match config.backend {
        StorageKind::Local => Arc::new(LocalStorage::new(
            &config.local_path,
            &config.public_url,
        )?),
        StorageKind::S3 => Arc::new(S3Storage::new(&config.s3).await?),
    };
    info!(backend = backend.name(), "Storage backend ready");
    Ok(backend)
}
