use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::middleware::AuthenticatedUser;
use crate::models::{ErrorResponse, ProgressResponse, UploadResponse};
use crate::state::AppState;
use crate::utils::sanitize_filename;

// poll endpoint: latest snapshot for the authenticated user
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<ProgressResponse>, (StatusCode, Json<ErrorResponse>)> {
    tracing::trace!(user = %user, "progress poll");

    match state.progress.get(&user) {
        Some(snapshot) => Ok(Json(snapshot.into())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No upload in progress".to_string(),
            }),
        )),
    }
}

// upload a file via multipart form data. this runs after the progress
// tracker has drained and reinstalled the body, so the multipart extractor
// here consumes the exact bytes the client sent.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, Json<ErrorResponse>)> {
    tracing::debug!("Processing file upload request");

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Failed to read multipart field: {}", e),
            }),
        )
    })? {
        let Some(filename) = field.file_name() else {
            // plain form field, not the file part
            continue;
        };

        tracing::debug!("Receiving file: {}", filename);

        // sanitize filename to prevent directory traversal
        let sanitized_filename = sanitize_filename(filename);
        let file_path = state.files_dir.join(&sanitized_filename);
        tracing::trace!("Target path: {:?}", file_path);

        // read the file data
        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read file data for {}: {}", sanitized_filename, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to read file data: {}", e),
                }),
            )
        })?;

        let size = data.len() as u64;
        tracing::debug!("File size: {} bytes", size);

        // write to disk
        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            tracing::error!("Failed to create file {}: {}", sanitized_filename, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to create file: {}", e),
                }),
            )
        })?;

        file.write_all(&data).await.map_err(|e| {
            tracing::error!("Failed to write to file {}: {}", sanitized_filename, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to write file: {}", e),
                }),
            )
        })?;

        file.sync_all().await.map_err(|e| {
            tracing::error!("Failed to sync file {}: {}", sanitized_filename, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to sync file: {}", e),
                }),
            )
        })?;

        tracing::info!("✅ Uploaded file: {} ({} bytes)", sanitized_filename, size);

        return Ok(Json(UploadResponse {
            success: true,
            filename: sanitized_filename,
            size,
        }));
    }

    tracing::warn!("Upload request contained no file field");
    Err((
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "No file provided".to_string(),
        }),
    ))
}

// health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "upload-pulse",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
