use crate::application::retrieval::{IngestReport, RetrievalService};
use crate::domain::entities::schedule_event::{ScheduleEvent, SCHEDULE_PREFIX};
use crate::domain::error::DomainError;
use crate::domain::values::metadata_filter::MetadataFilter;
use std::collections::BTreeSet;
use std::sync::Arc;

const LIST_PAGE: usize = 500;

/// Keeps schedule events searchable alongside other documents.
pub struct EventsUseCase {
    retrieval: Arc<RetrievalService>,
}

impl EventsUseCase {
    pub fn new(retrieval: Arc<RetrievalService>) -> Self {
        Self { retrieval }
    }

    pub async fn ingest_event(&self, event: &ScheduleEvent) -> Result<IngestReport, DomainError> {
        if event.id.trim().is_empty() {
            return Err(DomainError::InvalidInput("event id must not be empty".into()));
        }
        self.retrieval.ingest(&event.to_document()).await
    }

    /// Returns whether the event was indexed.
    pub fn remove_event(&self, event_id: &str) -> Result<bool, DomainError> {
        let removed = self
            .retrieval
            .store()
            .delete_document(&ScheduleEvent::document_id(event_id))?;
        Ok(removed > 0)
    }

    /// Indexed events, optionally only those on `date` (`YYYY-MM-DD`),
    /// ordered by date and start time.
    pub fn list_events(&self, date: Option<&str>) -> Result<Vec<ScheduleEvent>, DomainError> {
        let store = self.retrieval.store();
        let mut seen = BTreeSet::new();
        let mut events = Vec::new();
        let mut offset = 0;
        loop {
            let page = store.list(LIST_PAGE, offset)?;
            let fetched = page.items.len();
            for record in &page.items {
                if !record.document_id.starts_with(SCHEDULE_PREFIX) || !seen.insert(record.document_id.clone()) {
                    continue;
                }
                if let Some(event) = ScheduleEvent::from_record(record) {
                    if date.map_or(true, |d| event.date == d) {
                        events.push(event);
                    }
                }
            }
            offset += fetched;
            if fetched < LIST_PAGE {
                break;
            }
        }
        events.sort_by(|a, b| (&a.date, &a.start_time).cmp(&(&b.date, &b.start_time)));
        Ok(events)
    }

    /// Events closest to `query`, one entry per event.
    pub async fn search_events(&self, query: &str, k: usize) -> Result<Vec<ScheduleEvent>, DomainError> {
        let filter = MetadataFilter::default().with_equals("source", "schedule");
        let results = self.retrieval.search_filtered(query, k, Some(&filter)).await?;
        let mut seen = BTreeSet::new();
        Ok(results
            .into_iter()
            .filter(|r| seen.insert(r.document_id.clone()))
            .filter_map(|r| {
                let id = r.document_id.strip_prefix(SCHEDULE_PREFIX)?;
                ScheduleEvent::from_metadata(id, &r.metadata)
            })
            .collect())
    }
}
