//! Response DTOs for Web API.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::{Setting, User};
use crate::error::SkippedFile;
use crate::gallery::{Folder, Image};
use crate::upload::UploadOutcome;

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    /// Create a new message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Auth DTOs
// ============================================================================

/// User information in responses.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    /// Quota in bytes.
    pub storage_limit: i64,
    /// Bytes billed for stored images.
    pub storage_used: i64,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            storage_limit: user.storage_limit,
            storage_used: user.storage_used,
            created_at: user.created_at,
        }
    }
}

/// Login and registration response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Access token (JWT).
    pub token: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
    pub user: UserResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Gallery DTOs
// ============================================================================

/// Folder in responses.
#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub is_public: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Folder> for FolderResponse {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            user_id: folder.user_id,
            is_public: folder.is_public,
            created_at: folder.created_at,
            updated_at: folder.updated_at,
        }
    }
}

/// Image in responses. Storage keys stay server side; clients get URLs.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: i64,
    pub filename: String,
    pub mimetype: String,
    /// Billed bytes of all stored renditions.
    pub size: i64,
    pub folder_id: i64,
    pub user_id: i64,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub created_at: String,
}

impl From<Image> for ImageResponse {
    fn from(image: Image) -> Self {
        Self {
            id: image.id,
            filename: image.filename,
            mimetype: image.mimetype,
            size: image.size,
            folder_id: image.folder_id,
            user_id: image.user_id,
            url: image.url,
            thumbnail_url: image.thumbnail_url,
            preview_url: image.preview_url,
            created_at: image.created_at,
        }
    }
}

/// Result of an upload batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub new_images: Vec<ImageResponse>,
    /// Names of the files that were not stored.
    pub skipped_files: Vec<String>,
    /// The same files with the reason each was skipped.
    pub skipped_reasons: Vec<SkippedFile>,
    pub message: String,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        let message = outcome.message();
        Self {
            new_images: outcome.images.into_iter().map(Into::into).collect(),
            skipped_files: outcome.skipped.iter().map(|s| s.filename.clone()).collect(),
            skipped_reasons: outcome.skipped,
            message,
        }
    }
}

/// Folder deletion summary.
#[derive(Debug, Serialize)]
pub struct FolderDeletedResponse {
    pub message: String,
    pub images_removed: usize,
    pub bytes_reclaimed: i64,
}

/// Account deletion summary.
#[derive(Debug, Serialize)]
pub struct AccountDeletedResponse {
    pub message: String,
    pub folders_removed: usize,
    pub images_removed: usize,
}

// ============================================================================
// Settings DTOs
// ============================================================================

/// Settings as a key/value map.
pub type SettingsResponse = BTreeMap<String, String>;

/// A single setting.
#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: String,
}

impl From<Setting> for SettingResponse {
    fn from(setting: Setting) -> Self {
        Self {
            key: setting.key,
            value: setting.value,
        }
    }
}
