//! HTTP route handlers for the OCR portal.

pub mod health;
pub mod jobs;
pub mod metrics;
pub mod outputs;
pub mod upload;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/upload - Submit a batch of PDFs
/// - GET  /api/jobs/{job_id} - Job counters
/// - WS   /api/jobs/{job_id}/ws - Progress events for a job
/// - GET  /api/outputs - Recognized documents, newest first
/// - GET  /download/{filename} - Download one recognized document
/// - GET  /download-zip - Download every recognized document as a zip
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", upload::router())
        .nest("/api", jobs::router())
        .nest("/api", outputs::router())
        .merge(outputs::download_router())
        .merge(metrics::router())
        .with_state(state)
}
