//! Key/value settings stored in the database.

use sqlx::SqlitePool;

use crate::config::UploadConfig;
use crate::{Result, ShelfError};

/// Key of the per-file upload limit.
pub const MAX_UPLOAD_SIZE_KEY: &str = "max_upload_size";

/// Per-file upload limit used when the setting is absent or malformed.
pub const DEFAULT_MAX_UPLOAD_SIZE: i64 = 5 * 1024 * 1024;

/// A single setting row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Repository for settings.
pub struct SettingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingRepository<'a> {
    /// Create a new SettingRepository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a setting value by key.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(value)
    }

    /// List all settings ordered by key.
    pub async fn get_all(&self) -> Result<Vec<Setting>> {
        let settings =
            sqlx::query_as::<_, Setting>("SELECT key, value FROM settings ORDER BY key")
                .fetch_all(self.pool)
                .await
                .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(settings)
    }

    /// Insert or replace a setting.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(())
    }

    /// Insert a setting only if it is not present yet.
    pub async fn ensure_default(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(())
    }

    /// Seed settings that have a configured default. Values already in
    /// the table are kept.
    pub async fn seed_defaults(&self, upload: &UploadConfig) -> Result<()> {
        self.ensure_default(
            MAX_UPLOAD_SIZE_KEY,
            &upload.default_max_upload_size.to_string(),
        )
        .await
    }

    /// Per-file upload limit in bytes.
    pub async fn max_upload_size(&self) -> Result<i64> {
        let value = self.get(MAX_UPLOAD_SIZE_KEY).await?;
        Ok(value
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE))
    }
}
