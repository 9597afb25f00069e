//! Folder and image operations that span the database, the storage
//! backend and the quota ledger.

use std::collections::HashMap;

use tracing::{info, warn};

use super::folder::{validate_folder_name, Folder, FolderRepository, FolderUpdate, NewFolder};
use super::image::{Image, ImageRepository};
use crate::auth::{ensure_can_manage, ensure_can_read_folder, ActingUser};
use crate::db::UserRepository;
use crate::quota::QuotaLedger;
use crate::storage::{folder_prefix, StorageBackend};
use crate::{Database, Result, ShelfError};

/// Summary of a folder deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderDeletion {
    pub images_removed: usize,
    pub bytes_reclaimed: i64,
}

/// Summary of an account deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDeletion {
    pub folders_removed: usize,
    pub images_removed: usize,
}

/// Service for folder and image lifecycle operations.
pub struct GalleryService<'a> {
    db: &'a Database,
    storage: &'a dyn StorageBackend,
}

impl<'a> GalleryService<'a> {
    /// Create a new GalleryService.
    pub fn new(db: &'a Database, storage: &'a dyn StorageBackend) -> Self {
        Self { db, storage }
    }

    /// Create a folder owned by `actor`.
    pub async fn create_folder(
        &self,
        actor: &ActingUser,
        name: &str,
        is_public: bool,
    ) -> Result<Folder> {
        let name = validate_folder_name(name)?;
        let folder = FolderRepository::new(self.db.pool())
            .create(&NewFolder::new(name, actor.id).with_public(is_public))
            .await?;
        info!(folder_id = folder.id, user_id = actor.id, "Folder created");
        Ok(folder)
    }

    /// Get a folder the caller may read.
    pub async fn get_folder(&self, folder_id: i64, actor: Option<&ActingUser>) -> Result<Folder> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("folder".to_string()))?;
        ensure_can_read_folder(actor, &folder)?;
        Ok(folder)
    }

    /// List the images of a folder the caller may read.
    pub async fn list_folder_images(
        &self,
        folder_id: i64,
        actor: Option<&ActingUser>,
    ) -> Result<(Folder, Vec<Image>)> {
        let folder = self.get_folder(folder_id, actor).await?;
        let images = ImageRepository::new(self.db.pool())
            .list_by_folder(folder.id)
            .await?;
        Ok((folder, images))
    }

    /// Rename a folder or change its visibility. Owner or admin only.
    pub async fn update_folder(
        &self,
        folder_id: i64,
        actor: &ActingUser,
        mut update: FolderUpdate,
    ) -> Result<Folder> {
        let repo = FolderRepository::new(self.db.pool());
        let folder = repo
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("folder".to_string()))?;
        ensure_can_manage(actor, folder.user_id, "folder")?;

        if let Some(name) = update.name.take() {
            update.name = Some(validate_folder_name(&name)?);
        }

        repo.update(folder_id, &update)
            .await?
            .ok_or_else(|| ShelfError::NotFound("folder".to_string()))
    }

    /// Best-effort removal of every rendition of `image`.
    async fn remove_renditions(&self, image: &Image) {
        for key in image.rendition_keys() {
            if let Err(e) = self.storage.delete(key).await {
                warn!(image_id = image.id, key, error = %e, "Failed to delete rendition");
            }
        }
    }

    async fn prune_folder(&self, folder_id: i64) {
        if let Err(e) = self.storage.prune_prefix(&folder_prefix(folder_id)).await {
            warn!(folder_id, error = %e, "Failed to prune folder storage");
        }
    }

    /// Delete an image, its renditions and its billed bytes.
    ///
    /// Missing renditions are not an error. The quota is reclaimed only by
    /// the call that actually removes the row, so concurrent deletes of the
    /// same image reclaim once.
    pub async fn delete_image(&self, image_id: i64, actor: &ActingUser) -> Result<Image> {
        let image = ImageRepository::new(self.db.pool())
            .get_by_id(image_id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("image".to_string()))?;
        ensure_can_manage(actor, image.user_id, "image")?;

        self.remove_renditions(&image).await;

        let mut tx = self.db.begin().await?;
        if ImageRepository::delete(&mut *tx, image.id).await? {
            QuotaLedger::reclaim(&mut *tx, image.user_id, image.size).await?;
        }
        tx.commit()
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        self.prune_folder(image.folder_id).await;

        info!(
            image_id = image.id,
            user_id = image.user_id,
            reclaimed = image.size,
            "Image deleted"
        );
        Ok(image)
    }

    /// Delete a folder with all of its images. Owner or admin only.
    ///
    /// Every image goes through the same reclaim path as `delete_image`,
    /// billed back to its own uploader.
    pub async fn delete_folder(&self, folder_id: i64, actor: &ActingUser) -> Result<FolderDeletion> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("folder".to_string()))?;
        ensure_can_manage(actor, folder.user_id, "folder")?;

        let listed = ImageRepository::new(self.db.pool())
            .list_by_folder(folder.id)
            .await?;
        for image in &listed {
            self.remove_renditions(image).await;
        }

        // Rows are taken inside the transaction so images committed by a
        // concurrent upload after the listing are reclaimed too.
        let mut tx = self.db.begin().await?;
        let removed = sqlx::query_as::<_, Image>(
            "DELETE FROM images WHERE folder_id = ?
             RETURNING id, filename, stored_key, mimetype, size, folder_id, user_id, url,
                       thumbnail_key, thumbnail_url, preview_key, preview_url, created_at",
        )
        .bind(folder.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;

        let mut per_user: HashMap<i64, i64> = HashMap::new();
        for image in &removed {
            *per_user.entry(image.user_id).or_default() += image.size;
        }
        for (user_id, bytes) in &per_user {
            QuotaLedger::reclaim(&mut *tx, *user_id, *bytes).await?;
        }

        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(folder.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        for image in removed.iter().filter(|r| !listed.iter().any(|l| l.id == r.id)) {
            self.remove_renditions(image).await;
        }
        self.prune_folder(folder.id).await;

        let summary = FolderDeletion {
            images_removed: removed.len(),
            bytes_reclaimed: per_user.values().sum(),
        };
        info!(
            folder_id = folder.id,
            images = summary.images_removed,
            reclaimed = summary.bytes_reclaimed,
            "Folder deleted"
        );
        Ok(summary)
    }

    /// Delete a user account. Admin only.
    ///
    /// The user's folders go through `delete_folder`, so images other
    /// users uploaded there are reclaimed for them. Images the user
    /// uploaded into foreign folders go through `delete_image`. The user
    /// row is removed last.
    pub async fn delete_user(&self, user_id: i64, actor: &ActingUser) -> Result<AccountDeletion> {
        if !actor.is_admin() {
            return Err(ShelfError::Permission(
                "only administrators may delete accounts".to_string(),
            ));
        }
        let users = UserRepository::new(self.db.pool());
        if users.get_by_id(user_id).await?.is_none() {
            return Err(ShelfError::NotFound("user".to_string()));
        }

        let folders = FolderRepository::new(self.db.pool())
            .list_by_user(user_id)
            .await?;
        let mut images_removed = 0;
        for folder in &folders {
            match self.delete_folder(folder.id, actor).await {
                Ok(summary) => images_removed += summary.images_removed,
                Err(ShelfError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let foreign = ImageRepository::new(self.db.pool())
            .list_by_user(user_id)
            .await?;
        for image in &foreign {
            match self.delete_image(image.id, actor).await {
                Ok(_) => images_removed += 1,
                Err(ShelfError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if !users.delete(user_id).await? {
            return Err(ShelfError::NotFound("user".to_string()));
        }

        let summary = AccountDeletion {
            folders_removed: folders.len(),
            images_removed,
        };
        info!(
            user_id,
            admin_id = actor.id,
            folders = summary.folders_removed,
            images = summary.images_removed,
            "Account deleted"
        );
        Ok(summary)
    }
}
