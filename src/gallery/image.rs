//! Image records and repository.
//!
//! Inserts and deletes take any sqlite executor so the upload and deletion
//! paths can run them inside their own transactions.

use sqlx::{QueryBuilder, SqliteExecutor, SqlitePool};

use crate::{Result, ShelfError};

const IMAGE_COLUMNS: &str = "id, filename, stored_key, mimetype, size, folder_id, user_id, url, \
     thumbnail_key, thumbnail_url, preview_key, preview_url, created_at";

/// A stored image and its renditions.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Image {
    /// Unique image ID.
    pub id: i64,
    /// Original filename as uploaded.
    pub filename: String,
    /// Storage key of the original rendition.
    pub stored_key: String,
    /// Mimetype of the stored original.
    pub mimetype: String,
    /// Billed bytes: the sum over every stored rendition.
    pub size: i64,
    pub folder_id: i64,
    /// Uploader, billed for `size`.
    pub user_id: i64,
    /// URL of the original.
    pub url: String,
    pub thumbnail_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_key: Option<String>,
    pub preview_url: Option<String>,
    pub created_at: String,
}

impl Image {
    /// Storage keys of every rendition this record owns.
    pub fn rendition_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.stored_key.as_str()];
        keys.extend(self.thumbnail_key.as_deref());
        keys.extend(self.preview_key.as_deref());
        keys
    }
}

/// Data for inserting an image record.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub stored_key: String,
    pub mimetype: String,
    pub size: i64,
    pub folder_id: i64,
    pub user_id: i64,
    pub url: String,
    pub thumbnail_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_key: Option<String>,
    pub preview_url: Option<String>,
}

/// Repository for image records.
pub struct ImageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ImageRepository<'a> {
    /// Create a new ImageRepository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get an image by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Image>> {
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?");
        let image = sqlx::query_as::<_, Image>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(image)
    }

    /// Fetch the images with the given IDs, in ID order. Unknown IDs are
    /// ignored.
    pub async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Image>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id IN ("));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        let images = query
            .build_query_as::<Image>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(images)
    }

    /// List images in a folder, newest first.
    pub async fn list_by_folder(&self, folder_id: i64) -> Result<Vec<Image>> {
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE folder_id = ? ORDER BY created_at DESC, id DESC"
        );
        let images = sqlx::query_as::<_, Image>(&sql)
            .bind(folder_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(images)
    }

    /// List images uploaded by a user, in any folder.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Image>> {
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM images WHERE user_id = ? ORDER BY id");
        let images = sqlx::query_as::<_, Image>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(images)
    }

    /// Sum of billed sizes of a user's images.
    pub async fn total_size_by_user(&self, user_id: i64) -> Result<i64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM images WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(total)
    }

    /// Insert a record through `executor`.
    pub async fn insert<'e>(executor: impl SqliteExecutor<'e>, new: &NewImage) -> Result<Image> {
        let sql = format!(
            "INSERT INTO images (filename, stored_key, mimetype, size, folder_id, user_id, url,
                                 thumbnail_key, thumbnail_url, preview_key, preview_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {IMAGE_COLUMNS}"
        );
        let image = sqlx::query_as::<_, Image>(&sql)
            .bind(&new.filename)
            .bind(&new.stored_key)
            .bind(&new.mimetype)
            .bind(new.size)
            .bind(new.folder_id)
            .bind(new.user_id)
            .bind(&new.url)
            .bind(&new.thumbnail_key)
            .bind(&new.thumbnail_url)
            .bind(&new.preview_key)
            .bind(&new.preview_url)
            .fetch_one(executor)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(image)
    }

    /// Delete a record through `executor`.
    ///
    /// Returns true if this call removed the row.
    pub async fn delete<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }
}
