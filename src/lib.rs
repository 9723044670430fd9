pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::admin::{AdminUseCase, Export, ProbeReport, StatsReport};
use crate::application::embedder::EmbeddingClient;
use crate::application::events::EventsUseCase;
use crate::application::retrieval::{BatchOptions, BatchReport, IngestReport, RetrievalService};
use crate::config::{ProviderKind, Settings};
use crate::domain::entities::document::{Document, Page, SearchResult, StoredRecord};
use crate::domain::entities::schedule_event::ScheduleEvent;
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::vector_store::VectorStore;
use crate::domain::values::embedding::Embedding;
use crate::domain::values::metadata_filter::MetadataFilter;
use crate::infrastructure::embeddings::hashed::HashedProvider;
use crate::infrastructure::embeddings::http::HttpEmbeddingProvider;
use crate::infrastructure::sqlite::vector_store::SqliteVectorStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Retrieval subsystem: documents in, nearest documents out.
///
/// Construct one per process and share it; call `cleanup` on shutdown.
pub struct CampusRag {
    retrieval: Arc<RetrievalService>,
    admin: AdminUseCase,
    events: EventsUseCase,
}

impl CampusRag {
    pub fn new(settings: &Settings) -> Result<Self, DomainError> {
        let provider: Arc<dyn EmbeddingProvider> = match settings.provider {
            ProviderKind::Http => Arc::new(
                HttpEmbeddingProvider::new(settings.api_key.clone(), settings.model.clone(), settings.base_url.clone())
                    .with_timeout(settings.timeout),
            ),
            ProviderKind::Hashed => Arc::new(HashedProvider::default()),
        };
        let store = SqliteVectorStore::open(&settings.db_path, &settings.collection, settings.dimension_policy)?;
        Self::with_providers(provider, Arc::new(store), settings)
    }

    pub fn from_env() -> Result<Self, DomainError> {
        Self::new(&Settings::from_env()?)
    }

    pub fn with_providers(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        settings: &Settings,
    ) -> Result<Self, DomainError> {
        let hint = provider.dimension_hint();
        let embedder = Arc::new(EmbeddingClient::new(provider, settings.retry, settings.fallback_dimension));

        if let Some(stored_dim) = store.dimension()? {
            embedder.seed_dimension(stored_dim);
            if let Some(hint) = hint {
                if hint != stored_dim {
                    warn!(
                        collection = store.collection_name(),
                        stored = stored_dim,
                        provider = hint,
                        "collection dimension differs from the embedding provider; the next write will recreate it unless the policy is reject"
                    );
                }
            }
        }
        info!(
            provider = embedder.provider_name(),
            collection = store.collection_name(),
            policy = %settings.dimension_policy,
            "retrieval ready"
        );

        let retrieval = Arc::new(RetrievalService::new(embedder.clone(), store.clone(), settings.retrieval));
        Ok(Self {
            admin: AdminUseCase::new(store, embedder),
            events: EventsUseCase::new(retrieval.clone()),
            retrieval,
        })
    }

    pub async fn ingest(&self, document: &Document) -> Result<IngestReport, DomainError> {
        self.retrieval.ingest(document).await
    }

    pub async fn batch_ingest(&self, documents: &[Document], options: BatchOptions) -> BatchReport {
        self.retrieval.batch_ingest(documents, options).await
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, DomainError> {
        self.retrieval.search(query, k).await
    }

    pub async fn search_filtered(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>, DomainError> {
        self.retrieval.search_filtered(query, k, Some(filter)).await
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>, DomainError> {
        self.retrieval.get_document(id)
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, DomainError> {
        self.retrieval.embedder().embed(texts).await
    }

    pub fn embedding_dimension(&self) -> usize {
        self.retrieval.embedder().dimension()
    }

    /// Dimension reported by a live provider call; `None` if it is unavailable.
    pub async fn model_dimension(&self) -> Result<Option<usize>, DomainError> {
        self.retrieval.embedder().probe_dimension().await
    }

    // Admin

    pub fn export(&self) -> Result<Export, DomainError> {
        self.admin.export()
    }

    pub fn stats(&self) -> StatsReport {
        self.admin.stats()
    }

    pub fn list_documents(&self, limit: usize, offset: usize) -> Result<Page<Document>, DomainError> {
        self.admin.list_documents(limit, offset)
    }

    pub fn get(&self, id: &str) -> Result<StoredRecord, DomainError> {
        self.admin.get(id)
    }

    pub fn delete_document(&self, id: &str) -> Result<usize, DomainError> {
        self.admin.delete_document(id)
    }

    pub fn delete_all(&self) -> Result<usize, DomainError> {
        self.admin.delete_all()
    }

    pub fn reset(&self) -> Result<(), DomainError> {
        self.admin.reset()
    }

    pub async fn probe(&self) -> Result<ProbeReport, DomainError> {
        self.admin.probe().await
    }

    // Schedule events

    pub async fn ingest_event(&self, event: &ScheduleEvent) -> Result<IngestReport, DomainError> {
        self.events.ingest_event(event).await
    }

    pub fn remove_event(&self, event_id: &str) -> Result<bool, DomainError> {
        self.events.remove_event(event_id)
    }

    pub fn list_events(&self, date: Option<&str>) -> Result<Vec<ScheduleEvent>, DomainError> {
        self.events.list_events(date)
    }

    pub async fn search_events(&self, query: &str, k: usize) -> Result<Vec<ScheduleEvent>, DomainError> {
        self.events.search_events(query, k).await
    }

    /// Release the embedding connection pool. Safe to call more than once.
    pub fn cleanup(&self) {
        self.retrieval.cleanup();
    }
}
