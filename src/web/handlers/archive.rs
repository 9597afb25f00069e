//! Zip download handlers.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use std::sync::Arc;

use super::AppState;
use crate::archive::{stream_archive, ArchivePlan, ArchiveService};
use crate::web::dto::{BulkDownloadRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::OptionalAuthUser;

/// Build a Content-Disposition header value for an attachment.
///
/// Non-ASCII names get an RFC 5987 `filename*` parameter next to an ASCII
/// fallback in which every other character becomes `_`.
fn content_disposition_header(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if fallback == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

fn zip_response(state: &AppState, plan: ArchivePlan) -> Result<Response, ApiError> {
    tracing::info!(
        archive = %plan.name,
        images = plan.images.len(),
        "Starting archive download"
    );
    let disposition = content_disposition_header(&plan.file_name());
    let body = Body::from_stream(stream_archive(plan, state.storage.clone()));

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(body)
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// POST /api/images/download/bulk - Download selected images as a zip.
pub async fn download_images(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    ValidatedJson(req): ValidatedJson<BulkDownloadRequest>,
) -> Result<Response, ApiError> {
    let actor = auth.actor();
    let plan = ArchiveService::new(&state.db)
        .plan_selection(&req.image_ids, actor.as_ref())
        .await?;
    zip_response(&state, plan)
}

/// GET /api/folders/:id/download - Download a whole folder as a zip.
pub async fn download_folder(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Response, ApiError> {
    let actor = auth.actor();
    let plan = ArchiveService::new(&state.db)
        .plan_folder(folder_id, actor.as_ref())
        .await?;
    zip_response(&state, plan)
}
