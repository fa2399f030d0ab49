use super::*;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq)]
enum Received {
    LoadModel(String),
    Upload {
        field: String,
        filename: Option<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
    ClearDocuments,
    Query(QueryRequest),
    SetPrompt {
        field: String,
        text: String,
    },
}

#[derive(Clone)]
struct FakeRagState {
    received: Arc<Mutex<Vec<Received>>>,
    finish_stream: bool,
}

impl FakeRagState {
    fn record(&self, received: Received) {
        self.received.lock().expect("received lock").push(received);
    }
}

#[derive(Deserialize)]
struct LoadParams {
    model_name: String,
}

async fn handle_models() -> Json<serde_json::Value> {
    Json(json!({
        "available_models": ["orgA/modelX", "orgB/modelY"],
        "current_model": "orgA/modelX",
        "use_quantization": true,
    }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": true,
        "documents_count": 7,
    }))
}

async fn handle_load(
    State(state): State<FakeRagState>,
    Query(params): Query<LoadParams>,
) -> impl IntoResponse {
    state.record(Received::LoadModel(params.model_name.clone()));
    if params.model_name == "orgZ/broken" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "CUDA out of memory" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "message": format!("Model {} loaded", params.model_name) })),
    )
}

async fn handle_upload(
    State(state): State<FakeRagState>,
    mut multipart: Multipart,
) -> StatusCode {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let Ok(bytes) = field.bytes().await else {
            return StatusCode::BAD_REQUEST;
        };
        state.record(Received::Upload {
            field: name,
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    StatusCode::OK
}

async fn handle_clear(State(state): State<FakeRagState>) -> StatusCode {
    state.record(Received::ClearDocuments);
    StatusCode::OK
}

async fn handle_query(
    State(state): State<FakeRagState>,
    Json(request): Json<QueryRequest>,
) -> Json<serde_json::Value> {
    state.record(Received::Query(request));
    Json(json!({
        "answer": "4",
        "sources": ["doc1.pdf"],
        "model_used": "orgA/modelX",
    }))
}

async fn handle_query_stream(
    State(state): State<FakeRagState>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    state.record(Received::Query(request));
    let mut body = String::from(
        "data: {\"text\":\"Hel\"}\n\ndata: {\"text\":\"lo\"}\n\ndata: {\"sources\":[\"guide.pdf\"]}\n\n",
    );
    if state.finish_stream {
        body.push_str("data: [DONE]\n\n");
    }
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn handle_get_prompt() -> Json<serde_json::Value> {
    Json(json!({ "system_prompt": "Be concise." }))
}

async fn handle_set_prompt(
    State(state): State<FakeRagState>,
    mut multipart: Multipart,
) -> StatusCode {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let Ok(text) = field.text().await else {
            return StatusCode::BAD_REQUEST;
        };
        state.record(Received::SetPrompt { field: name, text });
    }
    StatusCode::OK
}

async fn spawn_rag_server(finish_stream: bool) -> Result<(String, Arc<Mutex<Vec<Received>>>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = FakeRagState {
        received: Arc::clone(&received),
        finish_stream,
    };
    let app = Router::new()
        .route("/models", get(handle_models))
        .route("/models/load", post(handle_load))
        .route("/health", get(handle_health))
        .route("/upload", post(handle_upload))
        .route("/documents", delete(handle_clear))
        .route("/query", post(handle_query))
        .route("/query/stream", post(handle_query_stream))
        .route("/system-prompt", get(handle_get_prompt).post(handle_set_prompt))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/"), received))
}

fn received(log: &Arc<Mutex<Vec<Received>>>) -> Vec<Received> {
    log.lock().expect("received lock").clone()
}

fn sample_request() -> QueryRequest {
    QueryRequest {
        query: "2+2?".to_string(),
        use_rag: true,
        max_tokens: 512,
        temperature: 0.7,
    }
}

#[test]
fn trailing_slash_is_trimmed_from_base_url() {
    let backend = HttpRagBackend::new("http://localhost:8000///");
    assert_eq!(backend.base_url(), "http://localhost:8000");
    assert_eq!(backend.endpoint("/health"), "http://localhost:8000/health");
}

#[tokio::test]
async fn lists_models_and_reads_health() {
    let (url, _log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);

    let models = backend.list_models().await.expect("models");
    assert_eq!(models.available_models.len(), 2);
    assert_eq!(models.current_model.as_deref(), Some("orgA/modelX"));

    let health = backend.health().await.expect("health");
    assert!(health.is_healthy());
    assert_eq!(health.documents_count, 7);
    assert_eq!(health.model_loaded, Some(true));
}

#[tokio::test]
async fn load_model_passes_name_as_query_parameter() {
    let (url, log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);

    backend.load_model("orgB/modelY").await.expect("load");

    assert_eq!(
        received(&log),
        vec![Received::LoadModel("orgB/modelY".to_string())]
    );
}

#[tokio::test]
async fn non_success_status_carries_error_detail() {
    let (url, _log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);

    let err = backend
        .load_model("orgZ/broken")
        .await
        .expect_err("server error");
    match err {
        BackendError::Status { status, detail } => {
            assert_eq!(status, 500);
            assert_eq!(detail.as_deref(), Some("CUDA out of memory"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_route_maps_to_status_without_detail() {
    let (url, _log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(format!("{url}missing"));

    let err = backend.health().await.expect_err("not found");
    assert!(matches!(
        err,
        BackendError::Status {
            status: 404,
            detail: None
        }
    ));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let backend = HttpRagBackend::new(format!("http://{addr}"));

    let err = backend.list_models().await.expect_err("connection refused");
    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn uploads_document_as_multipart_file_field() {
    let (url, log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);

    backend
        .upload_document(DocumentUpload {
            filename: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            bytes: b"hello rag".to_vec(),
        })
        .await
        .expect("upload");

    assert_eq!(
        received(&log),
        vec![Received::Upload {
            field: UPLOAD_FILE_FIELD.to_string(),
            filename: Some("notes.txt".to_string()),
            content_type: Some("text/plain".to_string()),
            bytes: b"hello rag".to_vec(),
        }]
    );
}

#[tokio::test]
async fn clear_documents_issues_delete() {
    let (url, log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);

    backend.clear_documents().await.expect("clear");

    assert_eq!(received(&log), vec![Received::ClearDocuments]);
}

#[tokio::test]
async fn query_posts_json_body_and_decodes_answer() {
    let (url, log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);

    let response = backend.query(&sample_request()).await.expect("query");

    assert_eq!(response.answer, "4");
    assert_eq!(response.sources, Some(vec!["doc1.pdf".to_string()]));
    assert_eq!(response.model_used.as_deref(), Some("orgA/modelX"));
    assert_eq!(received(&log), vec![Received::Query(sample_request())]);
}

#[tokio::test]
async fn query_stream_forwards_frames_until_done() {
    let (url, log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);
    let (tx, mut rx) = mpsc::unbounded_channel();

    backend
        .query_stream(&sample_request(), tx)
        .await
        .expect("stream");

    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        chunks.push(chunk);
    }
    assert_eq!(
        chunks,
        vec![
            QueryStreamChunk::Text("Hel".to_string()),
            QueryStreamChunk::Text("lo".to_string()),
            QueryStreamChunk::Sources(vec!["guide.pdf".to_string()]),
        ]
    );
    assert_eq!(received(&log), vec![Received::Query(sample_request())]);
}

#[tokio::test]
async fn query_stream_without_done_marker_is_an_error() {
    let (url, _log) = spawn_rag_server(false).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let err = backend
        .query_stream(&sample_request(), tx)
        .await
        .expect_err("truncated stream");
    assert!(matches!(err, BackendError::Stream(_)));

    let mut delivered = 0;
    while rx.recv().await.is_some() {
        delivered += 1;
    }
    assert_eq!(delivered, 3);
}

#[tokio::test]
async fn reads_and_writes_system_prompt() {
    let (url, log) = spawn_rag_server(true).await.expect("spawn server");
    let backend = HttpRagBackend::new(url);

    assert_eq!(
        backend.system_prompt().await.expect("get prompt"),
        "Be concise."
    );
    backend
        .set_system_prompt("Answer in French.")
        .await
        .expect("set prompt");

    assert_eq!(
        received(&log),
        vec![Received::SetPrompt {
            field: SYSTEM_PROMPT_FIELD.to_string(),
            text: "Answer in French.".to_string(),
        }]
    );
}
