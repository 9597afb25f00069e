//! Folder types and repository.

use sqlx::{QueryBuilder, SqlitePool};

use crate::{Result, ShelfError};

/// Maximum folder name length in characters.
pub const MAX_FOLDER_NAME_LENGTH: usize = 100;

const FOLDER_COLUMNS: &str = "id, name, user_id, is_public, created_at, updated_at";

/// A folder of images owned by one user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// Owner user ID.
    pub user_id: i64,
    /// Anyone may read a public folder.
    pub is_public: bool,
    /// When the folder was created.
    pub created_at: String,
    /// When the folder was last renamed or changed visibility.
    pub updated_at: String,
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub user_id: i64,
    pub is_public: bool,
}

impl NewFolder {
    /// Create a new private folder.
    pub fn new(name: impl Into<String>, user_id: i64) -> Self {
        Self {
            name: name.into(),
            user_id,
            is_public: false,
        }
    }

    /// Set the visibility.
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

/// Builder for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    pub name: Option<String>,
    pub is_public: Option<bool>,
}

impl FolderUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the visibility.
    pub fn is_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_public.is_none()
    }
}

/// Trim and check a folder name.
pub(crate) fn validate_folder_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ShelfError::Validation("folder name is required".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LENGTH {
        return Err(ShelfError::Validation(format!(
            "folder name must be at most {MAX_FOLDER_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

/// Repository for folder CRUD operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new folder.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO folders (name, user_id, is_public) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&folder.name)
        .bind(folder.user_id)
        .bind(folder.is_public)
        .fetch_one(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?");
        let folder = sqlx::query_as::<_, Folder>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(folder)
    }

    /// List folders owned by a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(folders)
    }

    /// List all public folders, newest first.
    pub async fn list_public(&self) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE is_public = 1 ORDER BY created_at DESC, id DESC"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(folders)
    }

    /// Update a folder.
    ///
    /// Returns the updated folder, or None if not found.
    pub async fn update(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE folders SET updated_at = datetime('now')");

        if let Some(ref name) = update.name {
            query.push(", name = ");
            query.push_bind(name);
        }
        if let Some(is_public) = update.is_public {
            query.push(", is_public = ");
            query.push_bind(is_public);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }
}
