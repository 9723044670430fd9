//! Calendar events as retrieval documents.
//!
//! The event CRUD store lives outside this crate; what lives here is the
//! mapping between an event and the document that makes it searchable.
//! Events are stored under the id `schedule:{event_id}` and every field is
//! kept in metadata so an event can be rebuilt from its stored record.

use crate::domain::entities::document::{Document, Metadata, StoredRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SCHEDULE_PREFIX: &str = "schedule:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Course,
    Activity,
    Exam,
    Meeting,
    Announcement,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Course => write!(f, "course"),
            EventType::Activity => write!(f, "activity"),
            EventType::Exam => write!(f, "exam"),
            EventType::Meeting => write!(f, "meeting"),
            EventType::Announcement => write!(f, "announcement"),
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "course" => Ok(EventType::Course),
            "activity" => Ok(EventType::Activity),
            "exam" => Ok(EventType::Exam),
            "meeting" => Ok(EventType::Meeting),
            "announcement" => Ok(EventType::Announcement),
            _ => Err(format!("Unknown event type: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub description: Option<String>,
}

impl ScheduleEvent {
    pub fn new(
        title: String,
        date: String,
        start_time: String,
        end_time: String,
        kind: EventType,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            date,
            start_time,
            end_time,
            location: None,
            kind,
            description: None,
        }
    }

    pub fn document_id(event_id: &str) -> String {
        format!("{SCHEDULE_PREFIX}{event_id}")
    }

    /// Text representation for embedding/search
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![
            format!("{} {}-{}", self.date, self.start_time, self.end_time),
            format!("[{}] {}", self.kind, self.title),
        ];
        if let Some(location) = self.location.as_deref().filter(|l| !l.is_empty()) {
            parts.push(format!("Location: {location}"));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            parts.push(description.to_string());
        }
        parts.join(" | ")
    }

    pub fn to_document(&self) -> Document {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), self.title.clone());
        metadata.insert("date".into(), self.date.clone());
        metadata.insert("startTime".into(), self.start_time.clone());
        metadata.insert("endTime".into(), self.end_time.clone());
        metadata.insert("type".into(), self.kind.to_string());
        metadata.insert("source".into(), "schedule".into());
        if let Some(location) = &self.location {
            metadata.insert("location".into(), location.clone());
        }
        if let Some(description) = &self.description {
            metadata.insert("description".into(), description.clone());
        }
        Document {
            id: Self::document_id(&self.id),
            text: self.searchable_text(),
            metadata,
        }
    }

    /// Rebuild an event from a stored record. Returns `None` for records
    /// that are not schedule documents.
    pub fn from_record(record: &StoredRecord) -> Option<Self> {
        let id = record.document_id.strip_prefix(SCHEDULE_PREFIX)?;
        Self::from_metadata(id, &record.metadata)
    }

    pub fn from_metadata(id: &str, metadata: &Metadata) -> Option<Self> {
        let field = |key: &str| metadata.get(key).cloned().unwrap_or_default();
        Some(Self {
            id: id.to_string(),
            title: field("title"),
            date: field("date"),
            start_time: field("startTime"),
            end_time: field("endTime"),
            location: metadata.get("location").cloned(),
            kind: metadata
                .get("type")
                .and_then(|t| t.parse().ok())
                .unwrap_or(EventType::Announcement),
            description: metadata.get("description").cloned(),
        })
    }
}
