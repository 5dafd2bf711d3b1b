use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Everything the fake backend has seen, for assertions.
#[derive(Default)]
pub struct Recorded {
    pub create_bodies: Vec<Value>,
    pub idempotency_keys: Vec<String>,
    pub authorization: Vec<Option<String>>,
    pub upload_requests: Vec<Value>,
    pub stored: HashMap<String, (Option<String>, Vec<u8>)>,
    /// Scripted status responses per job id, served front to back. The
    /// last entry repeats once the script runs out.
    pub statuses: HashMap<String, Vec<Value>>,
    pub status_calls: usize,
}

#[derive(Clone)]
pub struct FakeBackend {
    pub base_url: String,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeBackend {
    pub fn script(&self, job_id: &str, responses: Vec<Value>) {
        self.recorded
            .lock()
            .unwrap()
            .statuses
            .insert(job_id.to_string(), responses);
    }
}

/// Start an in-process backend on an ephemeral port.
pub async fn spawn_fake_backend() -> FakeBackend {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().unwrap();

    let backend = FakeBackend {
        base_url: format!("http://{addr}"),
        recorded: Arc::new(Mutex::new(Recorded::default())),
    };

    let app = Router::new()
        .route("/api/uploads", post(request_upload))
        .route("/storage/{key}", put(store_object))
        .route("/cdn/{key}", get(serve_object))
        .route("/api/tools/{tool}/jobs", post(create_job))
        .route("/api/tools/{tool}/jobs/{job_id}", get(job_status))
        .with_state(backend.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend");
    });

    backend
}

async fn request_upload(State(state): State<FakeBackend>, Json(body): Json<Value>) -> Json<Value> {
    let key = body["filename"].as_str().unwrap_or("object").to_string();
    state.recorded.lock().unwrap().upload_requests.push(body);
    Json(json!({
        "uploadUrl": format!("{}/storage/{key}", state.base_url),
        "fileUrl": format!("{}/cdn/{key}", state.base_url),
        "headers": {"x-amz-acl": "private"}
    }))
}

async fn store_object(
    State(state): State<FakeBackend>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if headers.get("authorization").is_some() || headers.get("x-amz-acl").is_none() {
        return StatusCode::FORBIDDEN;
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .recorded
        .lock()
        .unwrap()
        .stored
        .insert(key, (content_type, body.to_vec()));
    StatusCode::OK
}

async fn serve_object(State(state): State<FakeBackend>, Path(key): Path<String>) -> Response {
    match state.recorded.lock().unwrap().stored.get(&key) {
        Some((_, bytes)) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_job(
    State(state): State<FakeBackend>,
    Path(tool): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let source = body["sourceUrl"].as_str().unwrap_or_default().to_string();
    if source.contains("too-big") {
        return (StatusCode::PAYLOAD_TOO_LARGE, "request entity too large").into_response();
    }
    if source.contains("reject") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "Source could not be fetched"})),
        )
            .into_response();
    }

    let mut recorded = state.recorded.lock().unwrap();
    recorded.authorization.push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    if let Some(key) = headers.get("idempotency-key").and_then(|v| v.to_str().ok()) {
        recorded.idempotency_keys.push(key.to_string());
    }
    recorded.create_bodies.push(body);
    let job_id = format!("{tool}-{}", recorded.create_bodies.len());

    Json(json!({"jobId": job_id, "position": 2, "queueLength": 5})).into_response()
}

async fn job_status(
    State(state): State<FakeBackend>,
    Path((_tool, job_id)): Path<(String, String)>,
) -> Response {
    let mut recorded = state.recorded.lock().unwrap();
    recorded.status_calls += 1;
    match recorded.statuses.get_mut(&job_id) {
        Some(script) if !script.is_empty() => {
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            Json(next).into_response()
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "Job not found"}))).into_response(),
    }
}
