use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The vector store could not be opened or a statement failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Provider failure that retrying will not fix (4xx, malformed response).
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Network error, timeout, 429 or 5xx from the embedding provider.
    #[error("Embedding provider unavailable: {0}")]
    Transient(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Transient(_))
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(DomainError::Transient("503".into()).is_transient());
        assert!(!DomainError::Embedding("400".into()).is_transient());
        assert!(!DomainError::Config("no key".into()).is_transient());
        assert!(!DomainError::Database("locked".into()).is_transient());
    }

    #[test]
    fn mismatch_message_names_both_dimensions() {
        let e = DomainError::DimensionMismatch { expected: 1024, actual: 384 };
        assert_eq!(e.to_string(), "Dimension mismatch: collection expects 1024, got 384");
    }
}
