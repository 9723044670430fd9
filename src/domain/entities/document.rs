use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, String>;

/// Separator between a document id and a chunk index in record ids.
pub const CHUNK_ID_SEPARATOR: char = '#';

/// Metadata keys the retrieval service writes on chunk records.
pub const META_CHUNK_INDEX: &str = "chunk_index";
pub const META_CHUNK_START: &str = "chunk_start";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::InvalidInput("document id must not be empty".into()));
        }
        if self.id.contains(CHUNK_ID_SEPARATOR) {
            return Err(DomainError::InvalidInput(format!(
                "document id '{}' must not contain '{CHUNK_ID_SEPARATOR}'",
                self.id
            )));
        }
        if self.text.trim().is_empty() {
            return Err(DomainError::InvalidInput(format!(
                "document '{}' has empty text",
                self.id
            )));
        }
        if let Some(key) = [META_CHUNK_INDEX, META_CHUNK_START]
            .into_iter()
            .find(|k| self.metadata.contains_key(*k))
        {
            return Err(DomainError::InvalidInput(format!(
                "document '{}' uses reserved metadata key '{key}'",
                self.id
            )));
        }
        Ok(())
    }
}

/// Id of the stored record for chunk `index` of `document_id`.
pub fn chunk_record_id(document_id: &str, index: usize) -> String {
    format!("{document_id}{CHUNK_ID_SEPARATOR}{index}")
}

/// A record as written to the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub metadata: Metadata,
    pub vector: Vec<f32>,
}

impl VectorRecord {
    /// Single-record document: the record id is the document id.
    pub fn whole(document: &Document, vector: Vec<f32>) -> Self {
        Self {
            id: document.id.clone(),
            document_id: document.id.clone(),
            chunk_index: 0,
            text: document.text.clone(),
            metadata: document.metadata.clone(),
            vector,
        }
    }
}

/// A record as read back from the vector store (no vector).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub metadata: Metadata,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_blank_id_and_text() {
        assert!(Document::new("", "text").validate().is_err());
        assert!(Document::new("  ", "text").validate().is_err());
        assert!(Document::new("evt-1", "   ").validate().is_err());
        assert!(Document::new("evt-1", "AI Salon").validate().is_ok());
    }

    #[test]
    fn validate_rejects_reserved_separator() {
        let err = Document::new("evt#1", "text").validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn validate_rejects_reserved_metadata_keys() {
        let doc = Document::new("evt-1", "AI Salon").with_metadata("chunk_start", "3");
        let err = doc.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_start"));
        let doc = Document::new("evt-1", "AI Salon").with_metadata("chunk_index", "0");
        assert!(matches!(doc.validate(), Err(DomainError::InvalidInput(_))));
        let doc = Document::new("evt-1", "AI Salon").with_metadata("chunk", "0");
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn chunk_ids_are_deterministic() {
        assert_eq!(chunk_record_id("evt-1", 0), "evt-1#0");
        assert_eq!(chunk_record_id("evt-1", 12), "evt-1#12");
    }

    #[test]
    fn metadata_defaults_to_empty_when_missing() {
        let doc: Document = serde_json::from_str(r#"{"id":"a","text":"b"}"#).unwrap();
        assert!(doc.metadata.is_empty());
    }
}
