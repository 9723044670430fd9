//! Shared test helpers.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use campusrag::application::embedder::RetryPolicy;
use campusrag::config::{ProviderKind, Settings};
use campusrag::domain::error::DomainError;
use campusrag::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use campusrag::domain::values::dimension_policy::DimensionPolicy;
use campusrag::infrastructure::embeddings::hashed::HashedProvider;
use campusrag::infrastructure::sqlite::vector_store::SqliteVectorStore;
use campusrag::CampusRag;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub fn settings() -> Settings {
    Settings {
        provider: ProviderKind::Hashed,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        ..Settings::default()
    }
}

pub fn memory_store(policy: DimensionPolicy) -> Arc<SqliteVectorStore> {
    Arc::new(SqliteVectorStore::new(Connection::open_in_memory().unwrap(), "campus_acts", policy).unwrap())
}

pub fn setup() -> CampusRag {
    setup_with(Arc::new(HashedProvider::default()), memory_store(DimensionPolicy::Recreate))
}

pub fn setup_with(provider: Arc<dyn EmbeddingProvider>, store: Arc<SqliteVectorStore>) -> CampusRag {
    CampusRag::with_providers(provider, store, &settings()).unwrap()
}

/// Always fails with a transient error and counts calls.
#[derive(Default)]
pub struct DownProvider {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for DownProvider {
    async fn embed(&self, _texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DomainError::Transient("connection refused".into()))
    }

    fn dimension_hint(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// Local stand-in for an OpenAI-compatible embeddings API.
///
/// Request `n` (0-based) answers with `statuses[n]`, or 200 once the
/// script runs out. Successful responses carry one-hot vectors.
pub struct MockEmbeddingServer {
    pub base_url: String,
    pub calls: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct MockState {
    statuses: Arc<Vec<u16>>,
    calls: Arc<AtomicUsize>,
    dimension: usize,
}

async fn embeddings(State(state): State<MockState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let n = state.calls.fetch_add(1, Ordering::SeqCst);
    let status = state.statuses.get(n).copied().unwrap_or(200);
    if status != 200 {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (code, Json(json!({ "error": { "message": "scripted failure" } })));
    }
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let mut v = vec![0.0_f32; state.dimension];
            v[text.as_str().map(str::len).unwrap_or(0) % state.dimension] = 1.0;
            json!({ "object": "embedding", "embedding": v, "index": index })
        })
        .collect();
    (StatusCode::OK, Json(json!({ "object": "list", "data": data, "model": body["model"] })))
}

pub async fn spawn_mock_server(statuses: Vec<u16>, dimension: usize) -> MockEmbeddingServer {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = MockState {
        statuses: Arc::new(statuses),
        calls: calls.clone(),
        dimension,
    };
    let app = Router::new().route("/v1/embeddings", post(embeddings)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockEmbeddingServer {
        base_url: format!("http://{addr}"),
        calls,
    }
}

/// Answers every request correctly, but only after `delay`.
pub async fn spawn_slow_server(delay: Duration, dimension: usize) -> MockEmbeddingServer {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().route(
        "/v1/embeddings",
        post(move |Json(body): Json<Value>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                let inputs = body["input"].as_array().map(Vec::len).unwrap_or(0);
                let data: Vec<Value> = (0..inputs)
                    .map(|index| json!({ "embedding": vec![1.0_f32; dimension], "index": index }))
                    .collect();
                Json(json!({ "data": data }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockEmbeddingServer {
        base_url: format!("http://{addr}"),
        calls,
    }
}

/// Sends `200 OK` headers promising a 1000-byte body, then goes silent.
/// `calls` counts accepted connections.
pub async fn spawn_stalled_body_server() -> MockEmbeddingServer {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{\"data\": [";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    MockEmbeddingServer {
        base_url: format!("http://{addr}"),
        calls,
    }
}
