//! Parsing of CLI arguments into domain values.

use crate::application::retrieval::BatchOptions;
use crate::domain::entities::document::Document;
use crate::domain::entities::schedule_event::{EventType, ScheduleEvent};
use crate::domain::error::DomainError;
use crate::domain::values::metadata_filter::MetadataFilter;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchInput {
    Wrapped {
        documents: Vec<Document>,
        #[serde(default)]
        options: BatchOptions,
    },
    Bare(Vec<Document>),
}

/// Parse an import file: `{"documents": [...], "options": {...}}` or a bare array.
pub fn parse_batch(json: &str) -> Result<(Vec<Document>, BatchOptions), DomainError> {
    match serde_json::from_str(json)? {
        BatchInput::Wrapped { documents, options } => Ok((documents, options)),
        BatchInput::Bare(documents) => Ok((documents, BatchOptions::default())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventInput {
    id: Option<String>,
    title: String,
    date: String,
    start_time: String,
    end_time: String,
    location: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    kind: EventType,
    description: Option<String>,
}

fn default_kind() -> EventType {
    EventType::Activity
}

/// Parse an event; a missing id gets a fresh one.
pub fn parse_event(json: &str) -> Result<ScheduleEvent, DomainError> {
    let input: EventInput = serde_json::from_str(json)?;
    NaiveDate::parse_from_str(&input.date, "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidInput(format!("date '{}' is not YYYY-MM-DD", input.date)))?;
    let mut event = ScheduleEvent::new(input.title, input.date, input.start_time, input.end_time, input.kind);
    if let Some(id) = input.id.filter(|id| !id.trim().is_empty()) {
        event.id = id;
    }
    event.location = input.location;
    event.description = input.description;
    Ok(event)
}

fn parse_day(s: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidInput(format!("'{s}' is not a YYYY-MM-DD date")))
}

fn parse_clock(s: &str) -> Result<NaiveTime, DomainError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| DomainError::InvalidInput(format!("'{s}' is not an HH:MM time")))
}

pub fn parse_filter(
    pairs: &[String],
    from: Option<&str>,
    to: Option<&str>,
    time_from: Option<&str>,
    time_to: Option<&str>,
) -> Result<MetadataFilter, DomainError> {
    let mut filter = MetadataFilter::default();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| DomainError::InvalidInput(format!("filter '{pair}' must be KEY=VALUE")))?;
        filter = filter.with_equals(key.trim(), value.trim());
    }
    let from = from.map(parse_day).transpose()?;
    let to = to.map(parse_day).transpose()?;
    let time_from = time_from.map(parse_clock).transpose()?;
    let time_to = time_to.map(parse_clock).transpose()?;
    Ok(filter.between(from, to).during(time_from, time_to))
}
