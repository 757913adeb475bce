// crates/server/src/routes/jobs.rs
//! Job progress routes.
//!
//! - GET /jobs/{job_id} - point-in-time counters for a job
//! - WS  /jobs/{job_id}/ws - push channel for `progress`, `error` and `complete` events

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use ocr_portal_server_jobs::{BatchOrchestrator, JobSnapshot, ListenerId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Detaches the listener and forgets the job when the socket handler exits,
/// including when the task is cancelled during shutdown.
struct ListenerGuard {
    job_id: String,
    listener_id: ListenerId,
    orchestrator: Arc<BatchOrchestrator>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.orchestrator.detach(&self.job_id, self.listener_id);
        tracing::debug!(
            job_id = %self.job_id,
            listener = self.listener_id,
            "Progress listener disconnected"
        );
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/{job_id}", get(job_snapshot))
        .route("/jobs/{job_id}/ws", get(progress_ws))
}

/// GET /api/jobs/{job_id}
async fn job_snapshot(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .orchestrator
        .registry()
        .snapshot(&job_id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(job_id))
}

/// Upgrade and attach the socket as the job's only listener.
///
/// Unknown job ids are accepted: the client may connect before the batch is
/// submitted under that id, or after it was forgotten. Nothing is sent then.
async fn progress_ws(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let orchestrator = Arc::clone(&state.orchestrator);
    ws.on_upgrade(move |socket| handle_progress_socket(socket, job_id, orchestrator))
}

async fn handle_progress_socket(
    socket: WebSocket,
    job_id: String,
    orchestrator: Arc<BatchOrchestrator>,
) {
    // Registering inside the upgrade callback keeps register and detach in one scope.
    let (listener_id, mut events) = orchestrator.broadcaster().subscribe(&job_id);
    let _guard = ListenerGuard {
        job_id: job_id.clone(),
        listener_id,
        orchestrator: Arc::clone(&orchestrator),
    };
    tracing::debug!(job_id = %job_id, listener = listener_id, "Progress listener connected");

    let (mut sender, mut receiver) = socket.split();

    let forward_job_id = job_id.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(job_id = %forward_job_id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        // Stream ended: another connection took over this job.
        let _ = sender.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            _ = &mut forward_task => break,
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Client messages carry no meaning on this channel.
                Some(Ok(_)) => {}
            },
        }
    }

    forward_task.abort();
}
