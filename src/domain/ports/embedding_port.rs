use crate::domain::error::DomainError;

#[derive(Debug, Clone, Copy)]
pub enum InputType {
    Document,
    Query,
}

/// A single remote (or local) embedding backend. Implementations make one
/// attempt per call; retry and fallback policy live in `EmbeddingClient`.
///
/// Errors should be classified: `DomainError::Transient` for failures worth
/// retrying, `DomainError::Config` for misconfiguration that must surface,
/// anything else for permanent provider failures.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError>;

    /// Dimension the configured model is known to produce, if any.
    fn dimension_hint(&self) -> Option<usize>;

    fn name(&self) -> &str;

    /// Release pooled connections. Must be idempotent.
    fn release(&self) {}
}
