//! Image upload and deletion handlers.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::gallery::GalleryService;
use crate::upload::{spool_field, UploadService, UploadedFile};
use crate::web::dto::{MessageResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// Multipart field carrying the image files.
const UPLOAD_FIELD: &str = "images";

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body is too large")
    } else {
        tracing::debug!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    }
}

/// Spool every `images` part of the request to disk.
async fn read_files(state: &AppState, multipart: &mut Multipart) -> Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if files.len() >= state.max_files_per_request {
            return Err(ApiError::bad_request(format!(
                "At most {} files can be uploaded at once",
                state.max_files_per_request
            )));
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = match field.content_type() {
            Some(ct) => ct.to_string(),
            None => mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .to_string(),
        };
        files.push(spool_field(filename, content_type, state.temp_dir.as_deref(), field).await?);
    }

    Ok(files)
}

/// POST /api/images/upload/:folder_id - Upload images into a folder.
///
/// The batch runs on its own task so a client disconnect cannot stop it
/// between storing renditions and committing or rolling them back.
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(folder_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let files = read_files(&state, &mut multipart).await?;

    let actor = claims.actor();
    let task_state = state.clone();
    let outcome = tokio::spawn(async move {
        UploadService::new(
            &task_state.db,
            task_state.storage.as_ref(),
            task_state.derivatives,
        )
        .upload(folder_id, &actor, files)
        .await
    })
    .await
    .map_err(|e| {
        tracing::error!(folder_id, "Upload task failed: {}", e);
        ApiError::internal("Upload failed")
    })??;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// DELETE /api/images/:id - Delete an image and reclaim its storage.
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(image_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    GalleryService::new(&state.db, state.storage.as_ref())
        .delete_image(image_id, &claims.actor())
        .await?;
    Ok(Json(MessageResponse::new("Image deleted successfully")))
}
