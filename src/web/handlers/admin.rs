//! Admin handlers for Web API.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::db::{Role, SettingRepository, UserRepository, UserUpdate, MAX_UPLOAD_SIZE_KEY};
use crate::gallery::GalleryService;
use crate::quota::QuotaLedger;
use crate::web::dto::{
    AccountDeletedResponse, SettingResponse, UpdateRoleRequest, UpdateSettingRequest,
    UpdateStorageLimitRequest, UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AdminUser;

// ============================================================================
// User Management
// ============================================================================

/// GET /api/admin/users - List all users.
pub async fn admin_list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = UserRepository::new(state.db.pool()).list_all().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// PUT /api/admin/users/:id/storage-limit - Change a user's quota.
pub async fn admin_update_storage_limit(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateStorageLimitRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    QuotaLedger::new(state.db.pool())
        .set_limit(user_id, req.storage_limit)
        .await?;

    tracing::info!(
        admin_id = admin.sub,
        user_id,
        storage_limit = req.storage_limit,
        "Admin changed storage limit"
    );

    let user = UserRepository::new(state.db.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

/// PUT /api/admin/users/:id/role - Promote or demote a user.
///
/// Issued tokens keep the role they were signed with until they expire.
pub async fn admin_update_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let role: Role = req
        .role
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Role must be 'user' or 'admin'"))?;
    if user_id == admin.sub {
        return Err(ApiError::bad_request("Cannot change your own role"));
    }

    let user = UserRepository::new(state.db.pool())
        .update(user_id, &UserUpdate::new().role(role))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(admin_id = admin.sub, user_id, role = %role, "Admin changed role");
    Ok(Json(user.into()))
}

/// DELETE /api/admin/users/:id - Delete an account with its folders and images.
pub async fn admin_delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<Json<AccountDeletedResponse>, ApiError> {
    if user_id == admin.sub {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    let deletion = GalleryService::new(&state.db, state.storage.as_ref())
        .delete_user(user_id, &admin.actor())
        .await?;
    Ok(Json(AccountDeletedResponse {
        message: "User deleted successfully".to_string(),
        folders_removed: deletion.folders_removed,
        images_removed: deletion.images_removed,
    }))
}

// ============================================================================
// Settings Management
// ============================================================================

/// GET /api/admin/settings - List all settings.
pub async fn admin_list_settings(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<SettingResponse>>, ApiError> {
    let settings = SettingRepository::new(state.db.pool()).get_all().await?;
    Ok(Json(settings.into_iter().map(Into::into).collect()))
}

/// Check a new value against the format its key expects.
fn validate_setting_value(key: &str, value: &str) -> Result<(), ApiError> {
    if key == MAX_UPLOAD_SIZE_KEY {
        match value.trim().parse::<i64>() {
            Ok(size) if size > 0 => {}
            _ => {
                return Err(ApiError::bad_request(
                    "max_upload_size must be a positive number of bytes",
                ))
            }
        }
    }
    Ok(())
}

/// PUT /api/admin/settings - Change an existing setting.
pub async fn admin_update_setting(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidatedJson(req): ValidatedJson<UpdateSettingRequest>,
) -> Result<Json<SettingResponse>, ApiError> {
    let repo = SettingRepository::new(state.db.pool());
    let key = req.key.trim();
    if repo.get(key).await?.is_none() {
        return Err(ApiError::not_found("Setting not found"));
    }

    let value = req.value.trim();
    validate_setting_value(key, value)?;
    repo.set(key, value).await?;

    tracing::info!(admin_id = admin.sub, key, value, "Admin changed setting");

    Ok(Json(SettingResponse {
        key: key.to_string(),
        value: value.to_string(),
    }))
}
