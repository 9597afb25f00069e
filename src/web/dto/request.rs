//! Request DTOs for Web API.

use serde::Deserialize;
use validator::Validate;

use super::validation::{no_control_chars, not_empty_trimmed, single_line_name};

/// User registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Username.
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3 to 32 characters"),
        custom(function = "single_line_name")
    )]
    pub username: String,
    /// Email address.
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// Password.
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Username, or email when it contains `@`.
    #[validate(custom(function = "not_empty_trimmed"))]
    pub username_or_email: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Profile update request. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3 to 32 characters"),
        custom(function = "single_line_name")
    )]
    pub username: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

/// Password change request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    pub new_password: String,
}

/// Folder creation request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFolderRequest {
    /// Folder name.
    #[validate(
        custom(function = "single_line_name"),
        length(max = 100, message = "Folder name is too long")
    )]
    pub name: String,
    /// Visible to anonymous visitors.
    #[serde(default)]
    pub is_public: bool,
}

/// Folder update request. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFolderRequest {
    #[validate(
        custom(function = "single_line_name"),
        length(max = 100, message = "Folder name is too long")
    )]
    pub name: Option<String>,
    pub is_public: Option<bool>,
}

/// Bulk download request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkDownloadRequest {
    /// IDs of the images to export. An empty list is rejected by the
    /// archive planner.
    #[validate(length(max = 1000, message = "Select at most 1000 images"))]
    pub image_ids: Vec<i64>,
}

/// Admin request to change a user's quota.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStorageLimitRequest {
    /// New limit in bytes.
    #[validate(range(min = 0, message = "Storage limit must not be negative"))]
    pub storage_limit: i64,
}

/// Admin request to change a user's role.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    /// `user` or `admin`.
    #[validate(custom(function = "not_empty_trimmed"))]
    pub role: String,
}

/// Admin request to change a setting.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingRequest {
    #[validate(custom(function = "not_empty_trimmed"))]
    pub key: String,
    #[validate(custom(function = "no_control_chars"))]
    pub value: String,
}
