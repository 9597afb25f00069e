//! Settings handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::db::{SettingRepository, MAX_UPLOAD_SIZE_KEY};
use crate::web::dto::SettingsResponse;
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// Settings any logged-in user may read.
const USER_VISIBLE_SETTINGS: &[&str] = &[MAX_UPLOAD_SIZE_KEY];

/// GET /api/settings - Settings relevant to uploading clients.
pub async fn get_user_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(_claims): AuthUser,
) -> Result<Json<SettingsResponse>, ApiError> {
    let repo = SettingRepository::new(state.db.pool());
    let mut settings = SettingsResponse::new();
    for key in USER_VISIBLE_SETTINGS {
        if let Some(value) = repo.get(key).await? {
            settings.insert((*key).to_string(), value);
        }
    }
    Ok(Json(settings))
}
