use crate::application::embedder::EmbeddingClient;
use crate::domain::chunker::{chunk_document, merge_chunks, Chunk, ChunkingConfig};
use crate::domain::entities::document::{
    chunk_record_id, Document, SearchResult, StoredRecord, VectorRecord, META_CHUNK_INDEX, META_CHUNK_START,
};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::VectorStore;
use crate::domain::values::metadata_filter::MetadataFilter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_CHUNK_THRESHOLD: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub chunking: ChunkingConfig,
    /// Texts longer than this many characters are chunked.
    pub chunk_threshold: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks: usize,
    /// Chunks stored with a zero vector because the provider failed.
    pub degraded: usize,
    pub recreated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub skip_duplicates: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub index: usize,
    pub id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub ok: bool,
    pub imported: usize,
    pub skipped: usize,
    pub degraded: usize,
    pub errors: Vec<ItemError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct RetrievalService {
    embedder: Arc<EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(embedder: Arc<EmbeddingClient>, store: Arc<dyn VectorStore>, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn split(&self, document: &Document) -> Vec<Chunk> {
        if document.text.chars().count() <= self.config.chunk_threshold {
            return Vec::new();
        }
        chunk_document(&document.id, &document.text, &self.config.chunking)
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect()
    }

    /// Embed `document` and replace whatever the store held for its id.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport, DomainError> {
        document.validate()?;

        let chunks = self.split(document);
        let (records, degraded) = if chunks.len() <= 1 {
            let embedding = self.embedder.embed_one(&document.text).await?;
            let degraded = embedding.is_degraded();
            (vec![VectorRecord::whole(document, embedding.into_vector())], usize::from(degraded))
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            let degraded = embeddings.iter().filter(|e| e.is_degraded()).count();
            let records: Vec<VectorRecord> = chunks
                .into_iter()
                .zip(embeddings)
                .map(|(c, e)| {
                    let mut metadata = document.metadata.clone();
                    metadata.insert(META_CHUNK_INDEX.into(), c.sequence_index.to_string());
                    metadata.insert(META_CHUNK_START.into(), c.start.to_string());
                    VectorRecord {
                        id: chunk_record_id(&document.id, c.sequence_index),
                        document_id: document.id.clone(),
                        chunk_index: c.sequence_index,
                        text: c.text,
                        metadata,
                        vector: e.into_vector(),
                    }
                })
                .collect();
            (records, degraded)
        };

        let outcome = self.store.replace_document(&document.id, &records)?;
        info!(
            document_id = %document.id,
            chunks = records.len(),
            degraded,
            recreated = outcome.recreated,
            "ingested document"
        );

        Ok(IngestReport {
            document_id: document.id.clone(),
            chunks: records.len(),
            degraded,
            recreated: outcome.recreated,
        })
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, DomainError> {
        self.search_filtered(query, k, None).await
    }

    /// Nearest records to `query`, closest first. Blank queries return nothing.
    pub async fn search_filtered(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(vec![]);
        }
        let embedding = self.embedder.embed_query(query).await?;
        if embedding.is_degraded() {
            warn!(query, "searching with a zero vector; results are in insertion order");
        }
        let filter = filter.filter(|f| !f.is_empty());
        self.store.query_filtered(embedding.vector(), k, filter)
    }

    /// Ingest many documents. Item failures are collected, never raised.
    pub async fn batch_ingest(&self, documents: &[Document], options: BatchOptions) -> BatchReport {
        let mut imported = 0;
        let mut skipped = 0;
        let mut degraded = 0;
        let mut errors = Vec::new();

        for (index, document) in documents.iter().enumerate() {
            let fail = |e: DomainError| ItemError {
                index,
                id: Some(document.id.clone()).filter(|id| !id.trim().is_empty()),
                message: e.to_string(),
            };
            if let Err(e) = document.validate() {
                errors.push(fail(e));
                continue;
            }
            if options.skip_duplicates {
                match self.store.contains_document(&document.id) {
                    Ok(true) => {
                        skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        errors.push(fail(e));
                        continue;
                    }
                }
            }
            match self.ingest(document).await {
                Ok(report) => {
                    imported += 1;
                    degraded += report.degraded;
                }
                Err(e) => errors.push(fail(e)),
            }
        }

        if !errors.is_empty() {
            warn!(failed = errors.len(), total = documents.len(), "batch finished with errors");
        }
        let message = format!(
            "imported {imported}, skipped {skipped}, failed {}",
            errors.len()
        );
        BatchReport {
            ok: errors.is_empty(),
            imported,
            skipped,
            degraded,
            errors,
            message: Some(message),
        }
    }

    /// Rebuild a document from its stored records.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>, DomainError> {
        let records = self.store.document_records(id)?;
        Ok(rebuild_document(id, &records))
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<EmbeddingClient> {
        &self.embedder
    }

    pub fn cleanup(&self) {
        self.embedder.cleanup();
    }
}


/// Reassemble a document from its records, ordered by chunk index.
/// Returns `None` when there are no records.
pub fn rebuild_document(id: &str, records: &[StoredRecord]) -> Option<Document> {
    let first = records.first()?;

    let mut metadata = first.metadata.clone();
    metadata.remove(META_CHUNK_INDEX);
    metadata.remove(META_CHUNK_START);

    if records.len() == 1 && !first.metadata.contains_key(META_CHUNK_START) {
        return Some(Document {
            id: id.to_string(),
            text: first.text.clone(),
            metadata,
        });
    }

    // Missing offsets fall back to plain concatenation.
    let mut next_start = 0;
    let chunks: Vec<Chunk> = records
        .iter()
        .map(|r| {
            let start = r
                .metadata
                .get(META_CHUNK_START)
                .and_then(|s| s.parse().ok())
                .unwrap_or(next_start);
            let text_len = r.text.chars().count();
            next_start = start + text_len;
            Chunk {
                parent_id: id.to_string(),
                sequence_index: r.chunk_index,
                start,
                text: r.text.clone(),
            }
        })
        .collect();

    Some(Document {
        id: id.to_string(),
        text: merge_chunks(&chunks),
        metadata,
    })
}
