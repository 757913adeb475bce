// crates/server/src/main.rs
//! OCR portal server binary.
//!
//! Parses configuration, prepares the output directory, then serves until
//! Ctrl+C or SIGTERM. Running batches are allowed to finish before exit.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ocr_portal_core::{OcrAdapter, OcrMyPdf, OutputStore};
use ocr_portal_server::{create_app_with_body_limit, init_metrics, AppState, Config};
use ocr_portal_server_jobs::BatchOrchestrator;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "warn,ocr_portal=info,ocr_portal_server=info,ocr_portal_server_jobs=info,ocr_portal_core=info"
                .into()
        }))
        .init();

    let config = Config::parse();
    init_metrics();

    let store = OutputStore::new(&config.output_dir);
    store
        .ensure_dir()
        .await
        .with_context(|| format!("creating output dir {}", config.output_dir.display()))?;

    let engine = OcrMyPdf::new(&config.ocrmypdf);
    let adapter = OcrAdapter::new(Arc::new(engine), &config.output_dir)
        .with_max_parallel(config.max_parallel_ocr);
    let orchestrator = Arc::new(BatchOrchestrator::new(adapter));
    let state = AppState::new(Arc::clone(&orchestrator), store);
    let app = create_app_with_body_limit(state, config.max_upload_bytes());

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(
        %addr,
        output_dir = %config.output_dir.display(),
        ocrmypdf = %config.ocrmypdf.display(),
        max_parallel_ocr = config.max_parallel_ocr,
        "OCR portal listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let running = orchestrator.running_batches();
    if running > 0 {
        tracing::info!(running, "Waiting for running batches to finish");
    }
    orchestrator.shutdown().await;
    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
