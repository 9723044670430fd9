use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use crate::domain::values::embedding::Embedding;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_FALLBACK_DIMENSION: usize = 1024;
const PROBE_TEXT: &str = "dimension probe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base · 2^(retry-1)`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Embedding client used by ingestion and search.
///
/// Wraps one provider with:
/// - blank-input filtering (blank inputs get a zero vector and never reach the provider),
/// - retry with exponential backoff for transient failures,
/// - zero-vector fallback when the provider stays unavailable,
/// - a cached model dimension, learned from the first successful call.
///
/// Only `DomainError::Config` escapes as an error; every other provider
/// failure is reported as `Embedding::Degraded`.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    fallback_dimension: usize,
    // 0 = not yet known
    cached_dimension: AtomicUsize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, retry: RetryPolicy, fallback_dimension: usize) -> Self {
        Self {
            provider,
            retry,
            fallback_dimension: fallback_dimension.max(1),
            cached_dimension: AtomicUsize::new(0),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn cached_dimension(&self) -> Option<usize> {
        match self.cached_dimension.load(Ordering::Relaxed) {
            0 => None,
            d => Some(d),
        }
    }

    /// Seed the cache (e.g. from the collection's dimension) if nothing is known yet.
    pub fn seed_dimension(&self, dimension: usize) {
        if dimension > 0 {
            let _ = self
                .cached_dimension
                .compare_exchange(0, dimension, Ordering::Relaxed, Ordering::Relaxed);
        }
    }

    /// Length of the zero vectors used for blank and degraded inputs.
    pub fn dimension(&self) -> usize {
        self.cached_dimension()
            .or_else(|| self.provider.dimension_hint())
            .unwrap_or(self.fallback_dimension)
    }

    fn remember_dimension(&self, dimension: usize) {
        let previous = self.cached_dimension.swap(dimension, Ordering::Relaxed);
        if previous != 0 && previous != dimension {
            warn!(
                provider = self.provider.name(),
                previous,
                current = dimension,
                "embedding model dimension changed"
            );
        }
    }

    async fn call_with_retry(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.delay_for(attempt - 1)).await;
            }
            match self.provider.embed(texts, input_type).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() => {
                    warn!(provider = self.provider.name(), attempt, max_attempts = attempts, error = %e, "transient embedding failure");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| DomainError::Transient("embedding failed after retries".into())))
    }

    /// Common non-zero dimension of a provider response.
    fn check_vectors(vectors: &[Vec<f32>], expected: usize) -> Result<usize, DomainError> {
        if vectors.len() != expected {
            return Err(DomainError::Embedding(format!(
                "provider returned {} vectors for {expected} inputs",
                vectors.len()
            )));
        }
        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
            return Err(DomainError::Embedding("provider returned empty or ragged vectors".into()));
        }
        Ok(dim)
    }

    pub async fn embed_as(&self, texts: &[String], input_type: InputType) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let filtered: Vec<String> = texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if filtered.is_empty() {
            let dim = self.dimension();
            return Ok(texts.iter().map(|_| Embedding::Blank(Embedding::zero(dim))).collect());
        }

        let outcome = match self.call_with_retry(&filtered, input_type).await {
            Ok(vectors) => Self::check_vectors(&vectors, filtered.len()).map(|dim| (vectors, dim)),
            Err(e) => Err(e),
        };

        let (mut computed, dim, degraded) = match outcome {
            Ok((vectors, dim)) => {
                self.remember_dimension(dim);
                (vectors.into_iter(), dim, false)
            }
            Err(e @ DomainError::Config(_)) => return Err(e),
            Err(e) => {
                error!(
                    provider = self.provider.name(),
                    error = %e,
                    count = filtered.len(),
                    "embedding failed; substituting zero vectors"
                );
                (Vec::new().into_iter(), self.dimension(), true)
            }
        };

        let embeddings = texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    Embedding::Blank(Embedding::zero(dim))
                } else if degraded {
                    Embedding::Degraded(Embedding::zero(dim))
                } else {
                    computed
                        .next()
                        .map(Embedding::Computed)
                        .unwrap_or_else(|| Embedding::Degraded(Embedding::zero(dim)))
                }
            })
            .collect();
        debug!(provider = self.provider.name(), inputs = texts.len(), sent = filtered.len(), degraded, "embedded batch");
        Ok(embeddings)
    }

    /// Embed documents; one outcome per input, in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, DomainError> {
        self.embed_as(texts, InputType::Document).await
    }

    pub async fn embed_one(&self, text: &str) -> Result<Embedding, DomainError> {
        self.single(text, InputType::Document).await
    }

    pub async fn embed_query(&self, text: &str) -> Result<Embedding, DomainError> {
        self.single(text, InputType::Query).await
    }

    async fn single(&self, text: &str, input_type: InputType) -> Result<Embedding, DomainError> {
        let mut out = self.embed_as(&[text.to_string()], input_type).await?;
        out.pop()
            .ok_or_else(|| DomainError::Embedding("no embedding produced".into()))
    }

    /// Plain vectors, placeholders included.
    pub async fn embed_vectors(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        Ok(self.embed(texts).await?.into_iter().map(Embedding::into_vector).collect())
    }

    /// Ask the provider for the model dimension. `None` when the provider
    /// is unavailable.
    pub async fn probe_dimension(&self) -> Result<Option<usize>, DomainError> {
        let e = self.embed_one(PROBE_TEXT).await?;
        Ok(e.is_computed().then(|| e.vector().len()))
    }

    /// Synchronous `embed` for call sites that cannot await.
    ///
    /// Runs on a private current-thread runtime in a scoped thread, so it
    /// works both inside and outside a tokio runtime.
    pub fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Embedding>, DomainError> {
        std::thread::scope(|s| {
            s.spawn(|| {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| DomainError::Config(format!("runtime error: {e}")))?;
                rt.block_on(self.embed(texts))
            })
            .join()
            .map_err(|_| DomainError::Embedding("blocking embed thread panicked".into()))?
        })
    }

    /// Release the provider's pooled connection. Idempotent.
    pub fn cleanup(&self) {
        self.provider.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    /// Replays scripted results, then echoes 3-dim vectors.
    struct Scripted {
        script: Mutex<VecDeque<Result<(), DomainError>>>,
        calls: AtomicU32,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<(), DomainError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for Scripted {
        async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(texts.to_vec());
            if let Some(Err(e)) = self.script.lock().unwrap().pop_front() {
                return Err(e);
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0, 0.0]).collect())
        }

        fn dimension_hint(&self) -> Option<usize> {
            None
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_secs(2));
        assert_eq!(p.delay_for(3), Duration::from_secs(4));
        assert_eq!(p.delay_for(5), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_call() {
        let provider = Scripted::new(vec![]);
        let client = EmbeddingClient::new(provider.clone(), fast(), 8);
        assert!(client.embed(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_inputs_get_zero_vectors_without_a_call() {
        let provider = Scripted::new(vec![]);
        let client = EmbeddingClient::new(provider.clone(), fast(), 8);
        let out = client.embed(&strings(&["", "  "])).await.unwrap();
        assert_eq!(out, vec![Embedding::Blank(vec![0.0; 8]), Embedding::Blank(vec![0.0; 8])]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blanks_are_reinserted_in_place() {
        let provider = Scripted::new(vec![]);
        let client = EmbeddingClient::new(provider.clone(), fast(), 8);
        let out = client.embed(&strings(&["ab", " ", " cde "])).await.unwrap();
        assert_eq!(out[0], Embedding::Computed(vec![2.0, 1.0, 0.0]));
        assert_eq!(out[1], Embedding::Blank(vec![0.0; 3]));
        assert_eq!(out[2], Embedding::Computed(vec![3.0, 1.0, 0.0]));
        assert_eq!(provider.seen.lock().unwrap()[0], strings(&["ab", "cde"]));
        assert_eq!(client.cached_dimension(), Some(3));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let provider = Scripted::new(vec![
            Err(DomainError::Transient("503".into())),
            Err(DomainError::Transient("timeout".into())),
        ]);
        let client = EmbeddingClient::new(provider.clone(), fast(), 8);
        let out = client.embed_one("hello").await.unwrap();
        assert!(out.is_computed());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_to_cached_dimension() {
        let provider = Scripted::new(vec![
            Ok(()),
            Err(DomainError::Transient("down".into())),
            Err(DomainError::Transient("down".into())),
            Err(DomainError::Transient("down".into())),
        ]);
        let client = EmbeddingClient::new(provider.clone(), fast(), 8);
        client.embed_one("warm up").await.unwrap();
        let out = client.embed(&strings(&["a", ""])).await.unwrap();
        assert_eq!(out[0], Embedding::Degraded(vec![0.0; 3]));
        assert_eq!(out[1], Embedding::Blank(vec![0.0; 3]));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_failures_degrade_without_retry() {
        let provider = Scripted::new(vec![Err(DomainError::Embedding("400".into()))]);
        let client = EmbeddingClient::new(provider.clone(), fast(), 8);
        let out = client.embed_one("x").await.unwrap();
        assert_eq!(out, Embedding::Degraded(vec![0.0; 8]));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn config_errors_are_fatal() {
        let provider = Scripted::new(vec![Err(DomainError::Config("no key".into()))]);
        let client = EmbeddingClient::new(provider, fast(), 8);
        assert!(matches!(client.embed_one("x").await, Err(DomainError::Config(_))));
    }

    #[tokio::test]
    async fn seeded_dimension_is_used_for_fallback() {
        let provider = Scripted::new(vec![Err(DomainError::Embedding("bad".into()))]);
        let client = EmbeddingClient::new(provider, fast(), 8);
        client.seed_dimension(5);
        client.seed_dimension(7);
        assert_eq!(client.embed_one("x").await.unwrap(), Embedding::Degraded(vec![0.0; 5]));
    }

    #[tokio::test]
    async fn probe_reports_dimension_only_when_computed() {
        let provider = Scripted::new(vec![Err(DomainError::Embedding("bad".into()))]);
        let client = EmbeddingClient::new(provider, fast(), 8);
        assert_eq!(client.probe_dimension().await.unwrap(), None);
        assert_eq!(client.probe_dimension().await.unwrap(), Some(3));
    }

    #[test]
    fn blocking_matches_async_outside_runtime() {
        let client = EmbeddingClient::new(Scripted::new(vec![]), fast(), 8);
        let out = client.embed_blocking(&strings(&["abc", ""])).unwrap();
        assert_eq!(out, vec![Embedding::Computed(vec![3.0, 1.0, 0.0]), Embedding::Blank(vec![0.0; 3])]);
    }

    #[tokio::test]
    async fn blocking_works_inside_runtime() {
        let client = EmbeddingClient::new(Scripted::new(vec![]), fast(), 8);
        let sync = client.embed_blocking(&strings(&["abcd"])).unwrap();
        let async_ = client.embed(&strings(&["abcd"])).await.unwrap();
        assert_eq!(sync, async_);
    }
}
