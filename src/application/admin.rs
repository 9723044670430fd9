use crate::application::embedder::EmbeddingClient;
use crate::application::retrieval::rebuild_document;
use crate::domain::entities::document::{Document, Page, StoredRecord};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::{StoreHealth, VectorStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const EXPORT_PAGE: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub count: usize,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub document_count: usize,
    pub record_count: usize,
    pub storage_size_bytes: u64,
    pub storage_size_formatted: String,
    pub embedding_dimension: Option<usize>,
    pub collection_name: String,
    pub store_status: String,
    pub health: Option<StoreHealth>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Mismatch,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub status: ProbeStatus,
    pub model_dimension: Option<usize>,
    pub collection_dimension: Option<usize>,
    /// Writing now would not recreate the collection.
    pub compatible: bool,
    pub degraded: bool,
}

/// Human-readable size in binary units, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

pub struct AdminUseCase {
    store: Arc<dyn VectorStore>,
    embedder: Arc<EmbeddingClient>,
}

impl AdminUseCase {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<EmbeddingClient>) -> Self {
        Self { store, embedder }
    }

    /// Every document, reassembled from its chunks, in id order.
    pub fn export(&self) -> Result<Export, DomainError> {
        let mut documents = Vec::new();
        let mut offset = 0;
        loop {
            let ids = self.store.list_document_ids(EXPORT_PAGE, offset)?;
            for id in &ids.items {
                if let Some(doc) = rebuild_document(id, &self.store.document_records(id)?) {
                    documents.push(doc);
                }
            }
            if ids.items.len() < EXPORT_PAGE {
                break;
            }
            offset += EXPORT_PAGE;
        }
        Ok(Export {
            count: documents.len(),
            documents,
        })
    }

    /// Collection statistics. A failing store is reported in
    /// `store_status` instead of failing the call.
    pub fn stats(&self) -> StatsReport {
        match self.store.stats() {
            Ok(s) => StatsReport {
                document_count: s.document_count,
                record_count: s.record_count,
                storage_size_bytes: s.storage_size_bytes,
                storage_size_formatted: format_size(s.storage_size_bytes),
                embedding_dimension: s.embedding_dimension,
                collection_name: s.collection_name,
                store_status: "connected".into(),
                health: Some(s.health),
                last_updated: s.last_updated,
            },
            Err(e) => {
                warn!(error = %e, "vector store stats unavailable");
                StatsReport {
                    document_count: 0,
                    record_count: 0,
                    storage_size_bytes: 0,
                    storage_size_formatted: format_size(0),
                    embedding_dimension: None,
                    collection_name: self.store.collection_name().to_string(),
                    store_status: format!("error: {e}"),
                    health: None,
                    last_updated: None,
                }
            }
        }
    }

    pub fn list_documents(&self, limit: usize, offset: usize) -> Result<Page<Document>, DomainError> {
        let ids = self.store.list_document_ids(limit, offset)?;
        let mut items = Vec::with_capacity(ids.items.len());
        for id in &ids.items {
            // A document deleted between the two reads is skipped.
            if let Some(doc) = rebuild_document(id, &self.store.document_records(id)?) {
                items.push(doc);
            }
        }
        Ok(Page {
            items,
            total: ids.total,
            limit,
            offset,
        })
    }

    pub fn get(&self, id: &str) -> Result<StoredRecord, DomainError> {
        self.store
            .get(id)?
            .ok_or_else(|| DomainError::NotFound(format!("record {id}")))
    }

    /// Remove every record of a document; returns how many were removed.
    pub fn delete_document(&self, document_id: &str) -> Result<usize, DomainError> {
        let removed = self.store.delete_document(document_id)?;
        if removed == 0 {
            return Err(DomainError::NotFound(format!("document {document_id}")));
        }
        info!(document_id, removed, "deleted document");
        Ok(removed)
    }

    pub fn delete_all(&self) -> Result<usize, DomainError> {
        let removed = self.store.delete_all()?;
        info!(removed, collection = self.store.collection_name(), "deleted all records");
        Ok(removed)
    }

    /// Drop and recreate the collection. The next write sets its dimension.
    pub fn reset(&self) -> Result<(), DomainError> {
        self.store.recreate()?;
        warn!(collection = self.store.collection_name(), "collection reset");
        Ok(())
    }

    /// Compare the model's dimension with the collection's without writing.
    pub async fn probe(&self) -> Result<ProbeReport, DomainError> {
        let model_dimension = self.embedder.probe_dimension().await?;
        let collection_dimension = self.store.dimension()?;
        let (status, compatible) = match (model_dimension, collection_dimension) {
            (None, _) => (ProbeStatus::Unavailable, false),
            (Some(m), Some(c)) if m != c => (ProbeStatus::Mismatch, false),
            _ => (ProbeStatus::Ok, true),
        };
        Ok(ProbeReport {
            status,
            model_dimension,
            collection_dimension,
            compatible,
            degraded: model_dimension.is_none(),
        })
    }
}
