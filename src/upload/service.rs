//! Upload orchestration.
//!
//! A batch moves through validation, quota admission, per-file processing
//! and a single finalizing transaction:
//!
//! 1. The folder must exist and the caller must own it or be an admin.
//!    Files with an unsupported type, no content or more bytes than the
//!    `max_upload_size` setting are skipped. If nothing is left the batch
//!    fails as a whole.
//! 2. The summed size of the remaining files is reserved on the caller's
//!    quota. A batch that does not fit is rejected before anything is
//!    stored.
//! 3. Each file is decoded, its derivatives generated and written to the
//!    storage backend. A file that fails here has its already written
//!    renditions deleted and is reported as skipped.
//! 4. All image rows and the quota commit are written in one transaction.
//!    If that fails every rendition of the batch is deleted and the
//!    reservation released.
//!
//! A file absent from the result therefore has no renditions in storage
//! and was not billed; a file present has every rendition stored and is
//! billed exactly once for their summed size.

use tracing::{debug, info, warn};

use super::UploadedFile;
use crate::auth::{ensure_can_manage, ActingUser};
use crate::db::SettingRepository;
use crate::error::SkippedFile;
use crate::gallery::{FolderRepository, Image, ImageRepository, NewImage};
use crate::imaging::{self, DerivativeConfig, Rendition};
use crate::quota::{QuotaLedger, Reservation};
use crate::storage::{RenditionKeys, StorageBackend, StoredObject};
use crate::{Database, Result, ShelfError};

/// Result of an upload batch.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Records created by this batch.
    pub images: Vec<Image>,
    /// Files left out, with the reason.
    pub skipped: Vec<SkippedFile>,
}

impl UploadOutcome {
    /// Short summary for API responses.
    pub fn message(&self) -> String {
        let mut msg = format!("{} image(s) uploaded successfully", self.images.len());
        if !self.skipped.is_empty() {
            msg.push_str(&format!(", {} file(s) skipped", self.skipped.len()));
        }
        msg
    }
}

/// A processed file whose renditions are stored but not yet recorded.
struct StagedImage {
    record: NewImage,
    keys: Vec<String>,
}

/// Reason shown to the client for a file that failed mid-pipeline.
fn failure_reason(err: &ShelfError) -> String {
    match err {
        ShelfError::Processing(msg) => format!("could not process image: {msg}"),
        ShelfError::Storage(_) => "could not store file".to_string(),
        _ => "internal error".to_string(),
    }
}

/// Runs upload batches against the database and the storage backend.
pub struct UploadService<'a> {
    db: &'a Database,
    storage: &'a dyn StorageBackend,
    derivatives: DerivativeConfig,
}

impl<'a> UploadService<'a> {
    /// Create a new UploadService.
    pub fn new(
        db: &'a Database,
        storage: &'a dyn StorageBackend,
        derivatives: DerivativeConfig,
    ) -> Self {
        Self {
            db,
            storage,
            derivatives,
        }
    }

    /// Upload `files` into `folder_id` on behalf of `actor`.
    pub async fn upload(
        &self,
        folder_id: i64,
        actor: &ActingUser,
        files: Vec<UploadedFile>,
    ) -> Result<UploadOutcome> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("folder".to_string()))?;
        ensure_can_manage(actor, folder.user_id, "folder")?;

        if files.is_empty() {
            return Err(ShelfError::Validation("no files uploaded".to_string()));
        }

        let max_size = SettingRepository::new(self.db.pool())
            .max_upload_size()
            .await?;
        let (accepted, mut skipped) = partition(files, max_size);
        if accepted.is_empty() {
            info!(folder_id, user_id = actor.id, "Upload rejected: no valid files");
            return Err(ShelfError::NoValidFiles(skipped));
        }

        let requested: i64 = accepted.iter().map(UploadedFile::size).sum();
        let reservation = QuotaLedger::new(self.db.pool())
            .try_reserve(actor.id, requested)
            .await?;

        let mut staged = Vec::with_capacity(accepted.len());
        for file in accepted {
            match self.process_file(folder.id, actor, &file).await {
                Ok(image) => staged.push(image),
                Err(e) => {
                    warn!(
                        folder_id,
                        filename = file.filename(),
                        error = %e,
                        "File failed during upload"
                    );
                    skipped.push(SkippedFile::new(file.filename(), failure_reason(&e)));
                }
            }
        }

        if staged.is_empty() {
            self.release(reservation).await;
            return Err(ShelfError::NoValidFiles(skipped));
        }

        let images = match self.finalize(&reservation, &staged).await {
            Ok(images) => images,
            Err(e) => {
                warn!(folder_id, user_id = actor.id, error = %e, "Upload batch rolled back");
                for image in &staged {
                    self.remove_keys(&image.keys).await;
                }
                self.release(reservation).await;
                return Err(e);
            }
        };

        info!(
            folder_id,
            user_id = actor.id,
            created = images.len(),
            skipped = skipped.len(),
            billed = images.iter().map(|i| i.size).sum::<i64>(),
            "Upload batch complete"
        );
        Ok(UploadOutcome { images, skipped })
    }

    /// Generate and store every rendition of one file.
    ///
    /// Derivatives are written before the original. A failing original
    /// write removes the derivatives again; failing derivative writes only
    /// drop that derivative.
    async fn process_file(
        &self,
        folder_id: i64,
        actor: &ActingUser,
        file: &UploadedFile,
    ) -> Result<StagedImage> {
        let source = file.read().await?;
        let derivatives = imaging::generate_blocking(source, self.derivatives).await?;
        let keys = RenditionKeys::generate(
            folder_id,
            file.filename(),
            derivatives.original.extension,
        );

        let mut written = Vec::new();
        let thumbnail = match derivatives.thumbnail {
            Some(ref r) => self.put_optional(&keys.thumbnail, r, &mut written).await,
            None => None,
        };
        let preview = match derivatives.preview {
            Some(ref r) => self.put_optional(&keys.preview, r, &mut written).await,
            None => None,
        };

        let original = match self.put(&keys.original, &derivatives.original).await {
            Ok(stored) => stored,
            Err(e) => {
                self.remove_keys(&written).await;
                return Err(e);
            }
        };
        written.push(original.key.clone());

        let size = original.size
            + thumbnail.as_ref().map_or(0, |t| t.size)
            + preview.as_ref().map_or(0, |p| p.size);

        debug!(
            filename = file.filename(),
            key = %original.key,
            size,
            transcoded = derivatives.transcoded,
            "Stored renditions"
        );

        Ok(StagedImage {
            record: NewImage {
                filename: file.filename().to_string(),
                stored_key: original.key,
                mimetype: derivatives.original.mimetype.to_string(),
                size,
                folder_id,
                user_id: actor.id,
                url: original.url,
                thumbnail_key: thumbnail.as_ref().map(|t| t.key.clone()),
                thumbnail_url: thumbnail.map(|t| t.url),
                preview_key: preview.as_ref().map(|p| p.key.clone()),
                preview_url: preview.map(|p| p.url),
            },
            keys: written,
        })
    }

    async fn put(&self, key: &str, rendition: &Rendition) -> Result<StoredObject> {
        self.storage
            .put(key, rendition.data.clone(), rendition.mimetype)
            .await
    }

    async fn put_optional(
        &self,
        key: &str,
        rendition: &Rendition,
        written: &mut Vec<String>,
    ) -> Option<StoredObject> {
        match self.put(key, rendition).await {
            Ok(stored) => {
                written.push(stored.key.clone());
                Some(stored)
            }
            Err(e) => {
                warn!(key, error = %e, "Derivative not stored, continuing without it");
                None
            }
        }
    }

    /// Insert every record and bill the batch in one transaction.
    async fn finalize(&self, reservation: &Reservation, staged: &[StagedImage]) -> Result<Vec<Image>> {
        let billed: i64 = staged.iter().map(|s| s.record.size).sum();

        let mut tx = self.db.begin().await?;
        let mut images = Vec::with_capacity(staged.len());
        for image in staged {
            images.push(ImageRepository::insert(&mut *tx, &image.record).await?);
        }
        QuotaLedger::commit(&mut *tx, reservation, billed).await?;
        tx.commit()
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        Ok(images)
    }

    async fn remove_keys(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.storage.delete(key).await {
                warn!(key = %key, error = %e, "Failed to remove rendition during rollback");
            }
        }
    }

    async fn release(&self, reservation: Reservation) {
        if let Err(e) = QuotaLedger::new(self.db.pool()).release(reservation).await {
            warn!(
                user_id = reservation.user_id,
                error = %e,
                "Failed to release storage reservation"
            );
        }
    }
}

/// Split files into accepted and skipped by type and size.
fn partition(files: Vec<UploadedFile>, max_size: i64) -> (Vec<UploadedFile>, Vec<SkippedFile>) {
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for file in files {
        let reason = if !imaging::is_supported_mime(file.content_type()) {
            Some(format!("unsupported file type: {}", file.content_type()))
        } else if file.size() == 0 {
            Some("file is empty".to_string())
        } else if file.size() > max_size {
            Some(format!("file exceeds the maximum size of {max_size} bytes"))
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(filename = file.filename(), %reason, "Skipping file");
                skipped.push(SkippedFile::new(file.filename(), reason));
            }
            None => accepted.push(file),
        }
    }

    (accepted, skipped)
}
