//! Shared fixtures for route tests.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ocr_portal_core::{EngineError, EngineRequest, OcrEngine};
use tower::ServiceExt;

use crate::state::AppState;

/// Copies input to output. Inputs starting with `FAIL` are rejected.
pub struct CopyEngine;

impl OcrEngine for CopyEngine {
    fn run(&self, request: &EngineRequest<'_>) -> Result<(), EngineError> {
        let bytes = std::fs::read(request.input).map_err(|e| EngineError::Rejected(e.to_string()))?;
        if bytes.starts_with(b"FAIL") {
            return Err(EngineError::Rejected("input is not a PDF".to_string()));
        }
        std::fs::write(request.output, bytes).map_err(|e| EngineError::Rejected(e.to_string()))
    }
}

pub fn state(output_dir: &Path) -> Arc<AppState> {
    AppState::with_engine(Arc::new(CopyEngine), output_dir, 0)
}

pub const BOUNDARY: &str = "ocr-portal-test-boundary";

/// Build a `multipart/form-data` body from `(field, filename, content)` parts.
/// A `None` filename makes a plain text field.
pub fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
                     Content-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(uri: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let body = multipart_body(parts);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

/// Send one request and collect `(status, body)`.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}
