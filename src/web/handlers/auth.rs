//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::AppState;
use crate::auth::{hash_password, validate_password, verify_password};
use crate::db::{is_unique_violation, NewUser, UserRepository};
use crate::error::ShelfError;
use crate::web::dto::{AuthResponse, LoginRequest, RegisterRequest, UserResponse, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// POST /api/auth/register - User registration.
///
/// The first account registered on an empty instance becomes admin.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_password(&req.password)
        .map_err(|e| ApiError::unprocessable(format!("Password error: {}", e)))?;

    let repo = UserRepository::new(state.db.pool());
    if repo.username_exists(&req.username).await? {
        return Err(ApiError::conflict("Username already exists"));
    }
    if repo.email_exists(req.email.trim()).await? {
        return Err(ApiError::conflict("Email already in use"));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    let new_user = NewUser::new(req.username.trim(), req.email.trim(), password_hash)
        .with_storage_limit(state.default_storage_limit);
    let user = repo
        .create_first_admin(&new_user)
        .await
        .map_err(account_conflict)?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    let token = state.generate_access_token(&user)?;
    let response = AuthResponse {
        token,
        expires_in: state.access_token_expiry,
        user: user.into(),
        message: Some("User registered successfully".to_string()),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Map a lost uniqueness race on username or email to 409.
pub(crate) fn account_conflict(err: ShelfError) -> ApiError {
    if is_unique_violation(&err, "username") {
        ApiError::conflict("Username already exists")
    } else if is_unique_violation(&err, "email") {
        ApiError::conflict("Email already in use")
    } else {
        err.into()
    }
}

/// POST /api/auth/login - User login by username or email.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let repo = UserRepository::new(state.db.pool());
    let login = req.username_or_email.trim();
    let user = if login.contains('@') {
        repo.get_by_email(login).await?
    } else {
        repo.get_by_username(login).await?
    };

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    verify_password(&req.password, &user.password_hash)
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))?;

    tracing::debug!(user_id = user.id, "User logged in");

    let token = state.generate_access_token(&user)?;
    Ok(Json(AuthResponse {
        token,
        expires_in: state.access_token_expiry,
        user: user.into(),
        message: None,
    }))
}

/// GET /api/auth/me - Current user with storage usage.
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.into()))
}
