// crates/server/src/state.rs
//! Application state for the Axum server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use ocr_portal_core::{OcrAdapter, OcrEngine, OutputStore};
use ocr_portal_server_jobs::BatchOrchestrator;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Job registry, progress broadcaster and batch scheduler.
    pub orchestrator: Arc<BatchOrchestrator>,
    /// Read side of the output directory (downloads, listing, archive).
    pub store: OutputStore,
}

impl AppState {
    pub fn new(orchestrator: Arc<BatchOrchestrator>, store: OutputStore) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            orchestrator,
            store,
        })
    }

    /// Wire an engine, output directory and concurrency bound into a full state.
    pub fn with_engine(
        engine: Arc<dyn OcrEngine>,
        output_dir: impl Into<PathBuf>,
        max_parallel: usize,
    ) -> Arc<Self> {
        let output_dir = output_dir.into();
        let adapter = OcrAdapter::new(engine, output_dir.clone()).with_max_parallel(max_parallel);
        Self::new(
            Arc::new(BatchOrchestrator::new(adapter)),
            OutputStore::new(output_dir),
        )
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
