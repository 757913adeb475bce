//! End-to-end: upload over HTTP, progress over a real WebSocket, downloads.

use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures_util::StreamExt;
use ocr_portal_core::{EngineError, EngineRequest, OcrEngine};
use ocr_portal_server::{create_app, AppState};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite;
use tower::ServiceExt;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const BOUNDARY: &str = "progress-ws-boundary";

/// Runs only when released. Inputs starting with `FAIL` are rejected.
struct GatedEngine {
    gate: Mutex<std_mpsc::Receiver<()>>,
}

impl OcrEngine for GatedEngine {
    fn run(&self, request: &EngineRequest<'_>) -> Result<(), EngineError> {
        self.gate
            .lock()
            .unwrap()
            .recv()
            .map_err(|e| EngineError::Rejected(e.to_string()))?;
        let bytes = std::fs::read(request.input).map_err(|e| EngineError::Rejected(e.to_string()))?;
        if bytes.starts_with(b"FAIL") {
            return Err(EngineError::Rejected("not a PDF".to_string()));
        }
        std::fs::write(request.output, bytes).map_err(|e| EngineError::Rejected(e.to_string()))
    }
}

fn gated_state(dir: &Path) -> (Arc<AppState>, std_mpsc::Sender<()>) {
    let (release, gate) = std_mpsc::channel();
    let engine = GatedEngine {
        gate: Mutex::new(gate),
    };
    (AppState::with_engine(Arc::new(engine), dir, 0), release)
}

/// Start the app on a random port.
async fn start_test_server(state: Arc<AppState>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

async fn ws_connect(addr: SocketAddr, job_id: &str) -> WsStream {
    let url = format!("ws://{addr}/api/jobs/{job_id}/ws");
    let (ws, _response) = tokio_tungstenite::connect_async(&url).await.unwrap();
    ws
}

/// Receive the next JSON event, or `None` on timeout/close.
async fn recv_event(ws: &mut WsStream) -> Option<serde_json::Value> {
    match tokio::time::timeout(Duration::from_secs(5), ws.next()).await {
        Ok(Some(Ok(tungstenite::Message::Text(text)))) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// POST `files` to /api/upload through the router and return `(job_id, files)`.
async fn upload(state: Arc<AppState>, files: &[(&str, &str)]) -> (String, Vec<String>) {
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
             Content-Type: application/pdf\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"lang\"\r\n\r\neng\r\n--{BOUNDARY}--\r\n"
    ));

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    let response = create_app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let files = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap().to_string())
        .collect();
    (json["job_id"].as_str().unwrap().to_string(), files)
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = create_app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn batch_progress_then_complete_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let (state, release) = gated_state(dir.path());
    let (addr, server) = start_test_server(state.clone()).await;

    let (job_id, files) = upload(state.clone(), &[("a.pdf", "%PDF a"), ("b.pdf", "%PDF b")]).await;
    assert_eq!(files, vec!["ocr_a.pdf", "ocr_b.pdf"]);

    let mut ws = ws_connect(addr, &job_id).await;
    // Give the upgrade callback time to register before any document settles.
    tokio::time::sleep(Duration::from_millis(100)).await;
    release.send(()).unwrap();
    release.send(()).unwrap();

    let first = recv_event(&mut ws).await.unwrap();
    let second = recv_event(&mut ws).await.unwrap();
    assert_eq!(first["type"], "progress");
    assert_eq!((first["completed"].as_u64(), first["total"].as_u64()), (Some(1), Some(2)));
    assert_eq!(second["type"], "progress");
    assert_eq!((second["completed"].as_u64(), second["total"].as_u64()), (Some(2), Some(2)));

    let complete = recv_event(&mut ws).await.unwrap();
    assert_eq!(
        complete,
        serde_json::json!({"type": "complete", "files": ["ocr_a.pdf", "ocr_b.pdf"]})
    );

    let (status, body) = get(state.clone(), "/download/ocr_b.pdf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"%PDF b");

    server.abort();
}

#[tokio::test]
async fn failed_document_reported_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let (state, release) = gated_state(dir.path());
    let (addr, server) = start_test_server(state.clone()).await;

    let (job_id, _) = upload(state.clone(), &[("bad.pdf", "FAIL"), ("good.pdf", "%PDF g")]).await;
    let mut ws = ws_connect(addr, &job_id).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    release.send(()).unwrap();
    release.send(()).unwrap();

    let mut kinds = Vec::new();
    for _ in 0..2 {
        let event = recv_event(&mut ws).await.unwrap();
        if event["type"] == "error" {
            assert_eq!(event["file"], "ocr_bad.pdf");
            assert!(event["message"].as_str().unwrap().contains("ocr_bad.pdf"));
        }
        kinds.push(event["type"].as_str().unwrap().to_string());
    }
    kinds.sort();
    assert_eq!(kinds, vec!["error", "progress"]);

    // The failed output is still listed, but cannot be downloaded.
    let complete = recv_event(&mut ws).await.unwrap();
    assert_eq!(complete["files"], serde_json::json!(["ocr_bad.pdf", "ocr_good.pdf"]));
    let (status, _) = get(state.clone(), "/download/ocr_bad.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.abort();
}

#[tokio::test]
async fn disconnect_forgets_job_while_batch_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let (state, release) = gated_state(dir.path());
    let (addr, server) = start_test_server(state.clone()).await;

    let (job_id, _) = upload(state.clone(), &[("a.pdf", "%PDF a"), ("b.pdf", "%PDF b")]).await;
    let mut ws = ws_connect(addr, &job_id).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    release.send(()).unwrap();
    let first = recv_event(&mut ws).await.unwrap();
    assert_eq!(first["completed"], 1);

    ws.close(None).await.unwrap();
    let registry = Arc::clone(state.orchestrator.registry());
    for _ in 0..100 {
        if !registry.contains(&job_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!registry.contains(&job_id));

    // The remaining document still runs; its update finds no job and is skipped.
    release.send(()).unwrap();
    state.orchestrator.shutdown().await;
    assert!(dir.path().join("ocr_a.pdf").exists());
    assert!(dir.path().join("ocr_b.pdf").exists());

    let (status, _) = get(state.clone(), &format!("/api/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.abort();
}

#[tokio::test]
async fn unknown_job_socket_stays_silent() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _release) = gated_state(dir.path());
    let (addr, server) = start_test_server(state.clone()).await;

    let mut ws = ws_connect(addr, "no-such-job").await;
    let next = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(next.is_err(), "expected no events for an unknown job");

    ws.close(None).await.unwrap();
    server.abort();
}

#[tokio::test]
async fn zip_download_contains_finished_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let (state, release) = gated_state(dir.path());

    let _ = upload(state.clone(), &[("a.pdf", "%PDF a"), ("b.pdf", "%PDF b")]).await;
    release.send(()).unwrap();
    release.send(()).unwrap();
    state.orchestrator.shutdown().await;

    let (status, body) = get(state.clone(), "/download-zip").await;
    assert_eq!(status, StatusCode::OK);

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["ocr_a.pdf", "ocr_b.pdf"]);

    let mut content = String::new();
    archive
        .by_name("ocr_a.pdf")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "%PDF a");
}
