use crate::domain::entities::document::{Page, SearchResult, StoredRecord, VectorRecord};
use crate::domain::error::DomainError;
use crate::domain::values::metadata_filter::MetadataFilter;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: usize,
    /// The collection was dropped and recreated because the write's
    /// dimension differed from the recorded one.
    pub recreated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Healthy,
    Empty,
    /// Some stored vectors do not match the recorded dimension.
    Inconsistent,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub record_count: usize,
    pub storage_size_bytes: u64,
    pub embedding_dimension: Option<usize>,
    pub collection_name: String,
    pub health: StoreHealth,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Durable store of embedded records with nearest-neighbour search.
///
/// Every method is atomic. Writes enforce one dimension per collection;
/// what happens on a mismatch is the store's configured `DimensionPolicy`.
pub trait VectorStore: Send + Sync {
    fn upsert(&self, record: &VectorRecord) -> Result<WriteOutcome, DomainError> {
        self.upsert_batch(std::slice::from_ref(record))
    }
    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<WriteOutcome, DomainError>;
    /// Replace every record of `document_id` with `records`.
    fn replace_document(&self, document_id: &str, records: &[VectorRecord]) -> Result<WriteOutcome, DomainError>;

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>, DomainError> {
        self.query_filtered(vector, k, None)
    }
    fn query_filtered(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, DomainError>;

    fn get(&self, id: &str) -> Result<Option<StoredRecord>, DomainError>;
    fn document_records(&self, document_id: &str) -> Result<Vec<StoredRecord>, DomainError>;
    fn contains_document(&self, document_id: &str) -> Result<bool, DomainError>;
    fn list(&self, limit: usize, offset: usize) -> Result<Page<StoredRecord>, DomainError>;
    /// Distinct document ids in id order; `total` counts documents, not records.
    fn list_document_ids(&self, limit: usize, offset: usize) -> Result<Page<String>, DomainError>;

    fn delete(&self, id: &str) -> Result<bool, DomainError>;
    fn delete_document(&self, document_id: &str) -> Result<usize, DomainError>;
    fn delete_all(&self) -> Result<usize, DomainError>;

    fn stats(&self) -> Result<StoreStats, DomainError>;
    fn dimension(&self) -> Result<Option<usize>, DomainError>;
    /// Drop and recreate the collection; the next write sets its dimension.
    fn recreate(&self) -> Result<(), DomainError>;
    fn collection_name(&self) -> &str;
}
