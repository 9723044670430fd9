use crate::application::embedder::{RetryPolicy, DEFAULT_FALLBACK_DIMENSION};
use crate::application::retrieval::RetrievalConfig;
use crate::domain::chunker::ChunkingConfig;
use crate::domain::error::DomainError;
use crate::domain::values::dimension_policy::DimensionPolicy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "./campusrag.db";
pub const DEFAULT_COLLECTION: &str = "campus_acts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Http,
    /// Offline feature hashing.
    Hashed,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Http => write!(f, "http"),
            ProviderKind::Hashed => write!(f, "hashed"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" | "openai" | "siliconflow" => Ok(ProviderKind::Http),
            "hashed" | "offline" => Ok(ProviderKind::Hashed),
            other => Err(format!("Unknown embedding provider: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: String,
    pub collection: String,
    pub provider: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout: Duration,
    pub fallback_dimension: usize,
    pub retry: RetryPolicy,
    pub retrieval: RetrievalConfig,
    pub dimension_policy: DimensionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.into(),
            collection: DEFAULT_COLLECTION.into(),
            provider: ProviderKind::Http,
            api_key: String::new(),
            base_url: None,
            model: None,
            timeout: Duration::from_secs(30),
            fallback_dimension: DEFAULT_FALLBACK_DIMENSION,
            retry: RetryPolicy::default(),
            retrieval: RetrievalConfig::default(),
            dimension_policy: DimensionPolicy::default(),
        }
    }
}

impl Settings {
    /// Read settings from the environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, DomainError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DomainError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let provider = match get("EMBEDDING_PROVIDER") {
            Some(p) => p.parse().map_err(DomainError::Config)?,
            None => defaults.provider,
        };
        let dimension_policy = match get("DIMENSION_POLICY") {
            Some(p) => p.parse().map_err(DomainError::Config)?,
            None => defaults.dimension_policy,
        };

        let chunking = ChunkingConfig::new(
            number(&get, "CHUNK_MAX_CHARS", defaults.retrieval.chunking.max_chars)?,
            number(&get, "CHUNK_OVERLAP", defaults.retrieval.chunking.overlap_chars)?,
        )
        .map_err(|e| DomainError::Config(e.to_string()))?;

        let retry = RetryPolicy {
            max_attempts: number(&get, "EMBEDDING_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            base_delay: Duration::from_millis(number(
                &get,
                "EMBEDDING_BACKOFF_MS",
                defaults.retry.base_delay.as_millis() as u64,
            )?),
            max_delay: defaults.retry.max_delay,
        };

        Ok(Self {
            db_path: get("CAMPUSRAG_DB").unwrap_or(defaults.db_path),
            collection: get("CAMPUSRAG_COLLECTION").unwrap_or(defaults.collection),
            provider,
            api_key: get("EMBEDDING_API_KEY").unwrap_or_default(),
            base_url: get("EMBEDDING_BASE_URL"),
            model: get("EMBEDDING_MODEL"),
            timeout: Duration::from_secs(number(&get, "EMBEDDING_TIMEOUT_SECS", defaults.timeout.as_secs())?),
            fallback_dimension: number(&get, "EMBEDDING_FALLBACK_DIM", defaults.fallback_dimension)?,
            retry,
            retrieval: RetrievalConfig {
                chunking,
                chunk_threshold: number(&get, "CHUNK_THRESHOLD", defaults.retrieval.chunk_threshold)?,
            },
            dimension_policy,
        })
    }
}

fn number<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, DomainError> {
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| DomainError::Config(format!("{key} must be a non-negative integer, got '{raw}'"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, DomainError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.db_path, DEFAULT_DB_PATH);
        assert_eq!(s.collection, "campus_acts");
        assert_eq!(s.provider, ProviderKind::Http);
        assert_eq!(s.fallback_dimension, 1024);
        assert_eq!(s.retry.max_attempts, 3);
        assert_eq!(s.retrieval.chunking, ChunkingConfig::new(500, 50).unwrap());
        assert_eq!(s.dimension_policy, DimensionPolicy::Recreate);
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("EMBEDDING_PROVIDER", "hashed"),
            ("CHUNK_MAX_CHARS", "200"),
            ("CHUNK_OVERLAP", "20"),
            ("EMBEDDING_BACKOFF_MS", "5"),
            ("DIMENSION_POLICY", "reject"),
            ("EMBEDDING_MODEL", "  "),
        ])
        .unwrap();
        assert_eq!(s.provider, ProviderKind::Hashed);
        assert_eq!(s.retrieval.chunking.max_chars, 200);
        assert_eq!(s.retry.base_delay, Duration::from_millis(5));
        assert_eq!(s.dimension_policy, DimensionPolicy::Reject);
        assert_eq!(s.model, None);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(settings(&[("CHUNK_MAX_CHARS", "lots")]), Err(DomainError::Config(_))));
        assert!(matches!(settings(&[("CHUNK_OVERLAP", "600")]), Err(DomainError::Config(_))));
        assert!(matches!(settings(&[("EMBEDDING_PROVIDER", "magic")]), Err(DomainError::Config(_))));
    }
}
