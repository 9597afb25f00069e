//! Zip export of folders and image selections.
//!
//! Authorization happens up front in [`ArchiveService`] and produces an
//! [`ArchivePlan`]. [`stream_archive`] then writes the zip on a spawned
//! task into a bounded in-memory pipe whose read half becomes the
//! response body, so memory use stays at the pipe size no matter how large
//! the archive is and a slow client slows the writer down.

use std::collections::BTreeSet;
use std::io;

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, DuplexStream};
use tokio::sync::oneshot;
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::auth::{ensure_can_read_folder, ActingUser};
use crate::gallery::{FolderRepository, Image, ImageRepository};
use crate::storage::{SharedStorage, StorageBackend};
use crate::{Database, Result, ShelfError};

/// Size of the pipe between the zip writer and the response body.
const ARCHIVE_BUFFER: usize = 64 * 1024;

/// Images to export and the archive's base name.
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    pub name: String,
    pub images: Vec<Image>,
}

impl ArchivePlan {
    /// Download filename.
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.name)
    }
}

/// Counters of a finished archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub written: usize,
    pub missing: usize,
}

/// Resolves export requests into authorized plans.
pub struct ArchiveService<'a> {
    db: &'a Database,
}

impl<'a> ArchiveService<'a> {
    /// Create a new ArchiveService.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Plan an export of selected images.
    ///
    /// Authenticated callers must own every image or be admin. Anonymous
    /// callers may only export images that all sit in one public folder.
    pub async fn plan_selection(
        &self,
        image_ids: &[i64],
        actor: Option<&ActingUser>,
    ) -> Result<ArchivePlan> {
        if image_ids.is_empty() {
            return Err(ShelfError::Validation("image IDs are required".to_string()));
        }

        let ids: Vec<i64> = image_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let images = ImageRepository::new(self.db.pool()).find_by_ids(&ids).await?;
        let Some(first) = images.first() else {
            return Err(ShelfError::NotFound("images".to_string()));
        };

        match actor {
            Some(actor) => {
                if !images.iter().all(|img| actor.can_manage(img.user_id)) {
                    return Err(ShelfError::Permission(
                        "not authorized to download one or more of these images".to_string(),
                    ));
                }
                Ok(ArchivePlan {
                    name: "images".to_string(),
                    images,
                })
            }
            None => {
                let folder = FolderRepository::new(self.db.pool())
                    .get_by_id(first.folder_id)
                    .await?
                    .filter(|f| f.is_public)
                    .ok_or_else(|| {
                        ShelfError::Permission(
                            "log in to download images from a private folder".to_string(),
                        )
                    })?;

                if !images.iter().all(|img| img.folder_id == folder.id) {
                    return Err(ShelfError::Validation(
                        "all images must belong to the same public folder".to_string(),
                    ));
                }
                Ok(ArchivePlan {
                    name: folder.name,
                    images,
                })
            }
        }
    }

    /// Plan an export of a whole folder, readable by the caller.
    pub async fn plan_folder(
        &self,
        folder_id: i64,
        actor: Option<&ActingUser>,
    ) -> Result<ArchivePlan> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("folder".to_string()))?;
        ensure_can_read_folder(actor, &folder)?;

        let images = ImageRepository::new(self.db.pool())
            .list_by_folder(folder.id)
            .await?;
        if images.is_empty() {
            return Err(ShelfError::NotFound("images in folder".to_string()));
        }

        Ok(ArchivePlan {
            name: folder.name,
            images,
        })
    }
}

/// Entry name for an image: the final component of its original filename.
fn entry_name(image: &Image) -> String {
    let base = image
        .filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    match cleaned.trim() {
        "" | "." | ".." => format!("image-{}", image.id),
        name => name.to_string(),
    }
}

/// Write the originals of `images` as a zip into `writer`.
///
/// Images whose original is missing from storage are skipped.
pub async fn write_archive<W>(
    writer: W,
    images: &[Image],
    storage: &dyn StorageBackend,
) -> Result<ArchiveStats>
where
    W: AsyncWrite + Unpin,
{
    let mut zip = ZipFileWriter::new(writer.compat_write());
    let mut stats = ArchiveStats::default();

    for image in images {
        let reader = match storage.open(&image.stored_key).await {
            Ok(Some(reader)) => reader,
            Ok(None) => {
                warn!(image_id = image.id, key = %image.stored_key, "Missing original, skipped in archive");
                stats.missing += 1;
                continue;
            }
            Err(e) => {
                warn!(image_id = image.id, error = %e, "Unreadable original, skipped in archive");
                stats.missing += 1;
                continue;
            }
        };

        let entry = ZipEntryBuilder::new(entry_name(image).into(), Compression::Stored);
        let mut entry_writer = zip
            .write_entry_stream(entry)
            .await
            .map_err(|e| ShelfError::Storage(format!("zip entry: {e}")))?;
        futures::io::copy(reader.compat(), &mut entry_writer).await?;
        entry_writer
            .close()
            .await
            .map_err(|e| ShelfError::Storage(format!("zip entry: {e}")))?;
        stats.written += 1;
    }

    zip.close()
        .await
        .map_err(|e| ShelfError::Storage(format!("zip finish: {e}")))?;
    Ok(stats)
}

/// Stream the zip for `plan` as response body chunks.
///
/// If writing fails part way the stream ends with an error instead of a
/// silently truncated archive.
pub fn stream_archive(
    plan: ArchivePlan,
    storage: SharedStorage,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let (writer, reader): (DuplexStream, DuplexStream) = tokio::io::duplex(ARCHIVE_BUFFER);
    let (done_tx, done_rx) = oneshot::channel::<Option<String>>();

    tokio::spawn(async move {
        let result = write_archive(writer, &plan.images, storage.as_ref()).await;
        let failure = match result {
            Ok(stats) => {
                info!(
                    archive = %plan.name,
                    entries = stats.written,
                    missing = stats.missing,
                    "Archive streamed"
                );
                None
            }
            Err(e) => {
                warn!(archive = %plan.name, error = %e, "Archive aborted");
                Some(e.to_string())
            }
        };
        let _ = done_tx.send(failure);
    });

    let tail = futures::stream::once(done_rx).filter_map(|done| async move {
        match done {
            Ok(Some(msg)) => Some(Err(io::Error::new(io::ErrorKind::Other, msg))),
            _ => None,
        }
    });

    ReaderStream::new(reader).chain(tail)
}
