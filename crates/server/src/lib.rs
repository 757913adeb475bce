// crates/server/src/lib.rs
//! OCR portal server library.
//!
//! Axum HTTP and WebSocket surface over the batch OCR scheduler: uploads,
//! per-job progress push, and downloads of recognized documents.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::*;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Upload size accepted by [`create_app`].
pub const DEFAULT_BODY_LIMIT: usize = 512 * 1024 * 1024;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API, download and metrics routes
/// - CORS (allows any origin)
/// - Request tracing
/// - A request body cap of [`DEFAULT_BODY_LIMIT`]
pub fn create_app(state: Arc<AppState>) -> Router {
    create_app_with_body_limit(state, DEFAULT_BODY_LIMIT)
}

/// Like [`create_app`] with a custom request body cap in bytes.
pub fn create_app_with_body_limit(state: Arc<AppState>, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
