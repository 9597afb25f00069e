//! Folder handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::gallery::{FolderRepository, FolderUpdate, GalleryService};
use crate::web::dto::{
    CreateFolderRequest, FolderDeletedResponse, FolderResponse, ImageResponse,
    UpdateFolderRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, OptionalAuthUser};

/// POST /api/folders - Create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FolderResponse>), ApiError> {
    let folder = GalleryService::new(&state.db, state.storage.as_ref())
        .create_folder(&claims.actor(), &req.name, req.is_public)
        .await?;
    Ok((StatusCode::CREATED, Json(folder.into())))
}

/// GET /api/folders - List the caller's folders.
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<FolderResponse>>, ApiError> {
    let folders = FolderRepository::new(state.db.pool())
        .list_by_user(claims.sub)
        .await?;
    Ok(Json(folders.into_iter().map(Into::into).collect()))
}

/// GET /api/folders/public - List public folders.
pub async fn list_public_folders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FolderResponse>>, ApiError> {
    let folders = FolderRepository::new(state.db.pool()).list_public().await?;
    Ok(Json(folders.into_iter().map(Into::into).collect()))
}

/// GET /api/folders/:id - Get a folder.
pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<FolderResponse>, ApiError> {
    let actor = auth.actor();
    let folder = GalleryService::new(&state.db, state.storage.as_ref())
        .get_folder(folder_id, actor.as_ref())
        .await?;
    Ok(Json(folder.into()))
}

/// GET /api/folders/:id/images - List the images of a folder.
pub async fn list_folder_images(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<Vec<ImageResponse>>, ApiError> {
    let actor = auth.actor();
    let (_, images) = GalleryService::new(&state.db, state.storage.as_ref())
        .list_folder_images(folder_id, actor.as_ref())
        .await?;
    Ok(Json(images.into_iter().map(Into::into).collect()))
}

/// PUT /api/folders/:id - Rename a folder or change its visibility.
pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    let mut update = FolderUpdate::new();
    if let Some(name) = req.name {
        update = update.name(name);
    }
    if let Some(is_public) = req.is_public {
        update = update.is_public(is_public);
    }
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let folder = GalleryService::new(&state.db, state.storage.as_ref())
        .update_folder(folder_id, &claims.actor(), update)
        .await?;
    Ok(Json(folder.into()))
}

/// DELETE /api/folders/:id - Delete a folder with all of its images.
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<FolderDeletedResponse>, ApiError> {
    let deletion = GalleryService::new(&state.db, state.storage.as_ref())
        .delete_folder(folder_id, &claims.actor())
        .await?;
    Ok(Json(FolderDeletedResponse {
        message: "Folder deleted successfully".to_string(),
        images_removed: deletion.images_removed,
        bytes_reclaimed: deletion.bytes_reclaimed,
    }))
}
