//! Profile handlers for the logged-in user.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::auth::account_conflict;
use super::AppState;
use crate::auth::{hash_password, validate_password, verify_password};
use crate::db::{UserRepository, UserUpdate};
use crate::web::dto::{
    ChangePasswordRequest, MessageResponse, UpdateProfileRequest, UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /api/user/profile - Current user's profile.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

/// PUT /api/user/profile - Change username or email.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let repo = UserRepository::new(state.db.pool());
    let mut update = UserUpdate::new();

    if let Some(username) = req.username.as_deref().map(str::trim) {
        if let Some(other) = repo.get_by_username(username).await? {
            if other.id != claims.sub {
                return Err(ApiError::conflict("Username already exists"));
            }
        }
        update = update.username(username);
    }
    if let Some(email) = req.email.as_deref().map(str::trim) {
        if let Some(other) = repo.get_by_email(email).await? {
            if other.id != claims.sub {
                return Err(ApiError::conflict("Email already in use"));
            }
        }
        update = update.email(email);
    }
    if update.is_empty() {
        return Err(ApiError::bad_request("No changes provided"));
    }

    let user = repo
        .update(claims.sub, &update)
        .await
        .map_err(account_conflict)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = user.id, "Profile updated");
    Ok(Json(user.into()))
}

/// PUT /api/user/password - Change password after checking the current one.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let repo = UserRepository::new(state.db.pool());
    let user = repo
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    verify_password(&req.current_password, &user.password_hash)
        .map_err(|_| ApiError::bad_request("Invalid current password"))?;
    validate_password(&req.new_password)
        .map_err(|e| ApiError::unprocessable(format!("Password error: {}", e)))?;

    let password_hash = hash_password(&req.new_password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal("Failed to hash password")
    })?;
    repo.update(user.id, &UserUpdate::new().password_hash(password_hash))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = user.id, "Password changed");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}
