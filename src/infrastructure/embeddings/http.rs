use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn";
const DEFAULT_MODEL: &str = "BAAI/bge-m3";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI-compatible `/v1/embeddings` endpoint (OpenAI, SiliconFlow, vLLM, ...).
///
/// Holds one pooled `reqwest::Client`, built on first use and dropped by
/// `release`. A call after `release` builds a fresh client.
pub struct HttpEmbeddingProvider {
    client: Mutex<Option<Client>>,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: Option<usize>,
}

impl HttpEmbeddingProvider {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            client: Mutex::new(None),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether a pooled client is currently held.
    pub fn is_connected(&self) -> bool {
        self.client.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    fn model_dimension(model: &str) -> Option<usize> {
        match model {
            "BAAI/bge-m3" | "BAAI/bge-large-zh-v1.5" | "BAAI/bge-large-en-v1.5" => Some(1024),
            "netease-youdao/bce-embedding-base_v1" => Some(768),
            "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            _ => None,
        }
    }

    fn client(&self) -> Result<Client, DomainError> {
        let mut slot = self
            .client
            .lock()
            .map_err(|e| DomainError::Embedding(e.to_string()))?;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("HTTP client error: {e}")))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn classify_transport(e: reqwest::Error) -> DomainError {
        // Timeouts, refused connections and truncated bodies are all worth retrying.
        if e.is_decode() {
            DomainError::Embedding(format!("malformed embedding response: {e}"))
        } else {
            DomainError::Transient(format!("embedding request failed: {e}"))
        }
    }

    fn classify_status(status: StatusCode, body: String) -> DomainError {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            DomainError::Transient(format!("embedding API {status}: {body}"))
        } else {
            DomainError::Embedding(format!("embedding API {status}: {body}"))
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        if self.api_key.is_empty() {
            return Err(DomainError::Config("EMBEDDING_API_KEY is not set".into()));
        }
        if texts.is_empty() {
            return Ok(vec![]);
        }
        debug!(provider = "http", batch_size = texts.len(), model = %self.model, "embedding batch");

        let resp = self
            .client()?
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: texts,
                model: &self.model,
                encoding_format: "float",
            })
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let body = resp.bytes().await.map_err(Self::classify_transport)?;
        let result: EmbeddingResponse = serde_json::from_slice(&body)
            .map_err(|e| DomainError::Embedding(format!("malformed embedding response: {e}")))?;
        if result.data.len() != texts.len() {
            return Err(DomainError::Embedding(format!(
                "embedding API returned {} vectors for {} inputs",
                result.data.len(),
                texts.len()
            )));
        }

        let mut data = result.data;
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension_hint(&self) -> Option<usize> {
        Self::model_dimension(&self.model)
    }

    fn name(&self) -> &str {
        "http"
    }

    fn release(&self) {
        if let Ok(mut slot) = self.client.lock() {
            if slot.take().is_some() {
                debug!(provider = "http", "released pooled HTTP client");
            }
        }
    }
}
