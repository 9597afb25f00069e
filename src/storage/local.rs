//! Local filesystem backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::{validate_key, ObjectReader, StorageBackend, StoredObject};
use crate::{Result, ShelfError};

/// Stores renditions under an uploads root, one directory per folder.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalStorage {
    /// Create a backend rooted at `root`, creating the directory if needed.
    ///
    /// URLs are `{public_url}/{key}`.
    pub fn new(root: impl AsRef<Path>, public_url: &str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Uploads root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL for a key.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn storage_err(action: &str, key: &str, e: std::io::Error) -> ShelfError {
    ShelfError::Storage(format!("{action} {key}: {e}"))
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<StoredObject> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err("create directory for", key, e))?;
        }

        // Write to a sibling temp file and rename so readers never see a
        // partially written object.
        let tmp = path.with_file_name(format!(".{}.part", Uuid::new_v4().simple()));
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_err("write", key, e));
        }

        debug!(key, size = data.len(), "Stored object on disk");
        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size: data.len() as i64,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("delete", key, e)),
        }
    }

    async fn open(&self, key: &str) -> Result<Option<ObjectReader>> {
        let path = self.path_for(key)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::pin(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err("open", key, e)),
        }
    }

    async fn prune_prefix(&self, prefix: &str) -> Result<bool> {
        let dir = self.path_for(prefix)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(storage_err("list", prefix, e)),
        };

        if entries
            .next_entry()
            .await
            .map_err(|e| storage_err("list", prefix, e))?
            .is_some()
        {
            return Ok(false);
        }

        // A concurrent upload may have written into the directory since the
        // listing; remove_dir refuses non-empty directories.
        match tokio::fs::remove_dir(&dir).await {
            Ok(()) => {
                debug!(prefix, "Removed empty folder directory");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) if dir_not_empty(&e) => Ok(false),
            Err(e) => Err(storage_err("remove directory", prefix, e)),
        }
    }
}

fn dir_not_empty(e: &std::io::Error) -> bool {
    // ENOTEMPTY on Linux/macOS, ERROR_DIR_NOT_EMPTY on Windows.
    matches!(e.raw_os_error(), Some(39) | Some(66) | Some(145))
}
