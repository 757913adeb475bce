// crates/server/src/error.rs
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ocr_portal_core::StoreError;
use ocr_portal_server_jobs::{RegistryError, SubmitError};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Batch rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Output store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
                )
            }
            ApiError::Submit(submit_err) => {
                let (status, error_msg) = match submit_err {
                    SubmitError::EmptyBatch => (StatusCode::BAD_REQUEST, "No files uploaded"),
                    SubmitError::InvalidFilename(_) => (StatusCode::BAD_REQUEST, "Invalid filename"),
                    SubmitError::DuplicateOutput(_) => {
                        (StatusCode::BAD_REQUEST, "Duplicate filename in batch")
                    }
                    SubmitError::InvalidLanguage(_) => (StatusCode::BAD_REQUEST, "Invalid language"),
                    SubmitError::Registry(RegistryError::DuplicateJob(_)) => {
                        (StatusCode::CONFLICT, "Job already exists")
                    }
                    SubmitError::Registry(RegistryError::UnknownJob(_)) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "Job registry error")
                    }
                };
                tracing::warn!(error = %submit_err, status = status.as_u16(), "Batch rejected");
                (
                    status,
                    ErrorResponse::with_details(error_msg, submit_err.to_string()),
                )
            }
            ApiError::Store(store_err) => match store_err {
                StoreError::NotFound { name } => {
                    tracing::warn!(file = %name, "Output not found");
                    (StatusCode::NOT_FOUND, ErrorResponse::new("File not found"))
                }
                StoreError::InvalidName { name } => {
                    tracing::warn!(file = %name, "Rejected output name");
                    (
                        StatusCode::BAD_REQUEST,
                        ErrorResponse::with_details("Invalid file name", store_err.to_string()),
                    )
                }
                StoreError::Io { path, source } => {
                    tracing::error!(path = %path.display(), error = %source, "Output store IO error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("IO error reading outputs"),
                    )
                }
                StoreError::Archive(msg) => {
                    tracing::error!(message = %msg, "Archive build failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("Failed to build archive"),
                    )
                }
            },
            ApiError::Multipart(multipart_err) => {
                tracing::warn!(error = %multipart_err, "Malformed multipart upload");
                (
                    multipart_err.status(),
                    ErrorResponse::with_details("Malformed upload", multipart_err.body_text()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
