//! Batch upload endpoint.
//!
//! - POST /api/upload - multipart `files` parts plus an optional `lang` field

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use ocr_portal_core::DEFAULT_LANGUAGE;
use ocr_portal_server_jobs::DocumentUpload;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Returned as soon as the batch is accepted; progress follows over the job's WebSocket.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct UploadResponse {
    pub job_id: String,
    /// Output ids in submission order.
    pub files: Vec<String>,
}

/// POST /api/upload: accept a batch of PDFs and start recognition.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut uploads = Vec::new();
    let mut language: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("files") => {
                let filename = field.file_name().map(str::to_owned).unwrap_or_default();
                let content = field.bytes().await?;
                // Browsers send an empty, unnamed part when no file was picked.
                if filename.is_empty() && content.is_empty() {
                    continue;
                }
                tracing::debug!(file = %filename, bytes = content.len(), "Received document");
                uploads.push(DocumentUpload::new(filename, content));
            }
            Some("lang") => {
                language = Some(field.text().await?.trim().to_string());
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let language = language
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    // The batch handle is detached; the orchestrator's tracker keeps it alive.
    let batch = state.orchestrator.submit(uploads, &language)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            job_id: batch.job_id,
            files: batch.outputs,
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload))
}
