//! Output listing and download routes.
//!
//! - GET /api/outputs - recognized documents, newest first
//! - GET /download/{filename} - one recognized document
//! - GET /download-zip - every recognized document as `ocr_results.zip`

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ocr_portal_core::{OutputEntry, ARCHIVE_NAME};
use tokio_util::io::ReaderStream;

use crate::error::ApiResult;
use crate::state::AppState;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/outputs", get(list_outputs))
}

/// Download routes, served from the root so links stay short.
pub fn download_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/download/{filename}", get(download_file))
        .route("/download-zip", get(download_zip))
}

async fn list_outputs(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<OutputEntry>>> {
    Ok(Json(state.store.list().await?))
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let (file, len) = state.store.open(&filename).await?;
    tracing::debug!(file = %filename, bytes = len, "Serving output");
    Ok(attachment(&filename, content_type(&filename), file, len))
}

async fn download_zip(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let (file, len) = state.store.archive().await?;
    tracing::info!(bytes = len, "Serving output archive");
    Ok(attachment(ARCHIVE_NAME, "application/zip", file, len))
}

fn content_type(filename: &str) -> &'static str {
    if filename.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

/// Stream `file` back as a download.
fn attachment(
    filename: &str,
    content_type: &'static str,
    file: tokio::fs::File,
    len: u64,
) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            ),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}
