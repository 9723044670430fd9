use crate::domain::entities::document::Metadata;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Restricts search results by metadata. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub equals: BTreeMap<String, String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Keeps records whose `startTime`..`endTime` overlaps this window.
    #[serde(default)]
    pub time_from: Option<NaiveTime>,
    #[serde(default)]
    pub time_to: Option<NaiveTime>,
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.time_from.is_none()
            && self.time_to.is_none()
    }

    pub fn with_equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        // Inverted bounds are swapped rather than matching nothing.
        match (from, to) {
            (Some(a), Some(b)) if a > b => {
                self.date_from = Some(b);
                self.date_to = Some(a);
            }
            _ => {
                self.date_from = from;
                self.date_to = to;
            }
        }
        self
    }

    /// Time-of-day window. Inverted bounds are swapped.
    pub fn during(mut self, from: Option<NaiveTime>, to: Option<NaiveTime>) -> Self {
        (self.time_from, self.time_to) = match (from, to) {
            (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
            _ => (from, to),
        };
        self
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        let equal = self
            .equals
            .iter()
            .all(|(k, v)| metadata.get(k).is_some_and(|m| m == v));
        equal && self.matches_date(metadata) && self.matches_time(metadata)
    }

    fn matches_date(&self, metadata: &Metadata) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(date) = metadata
            .get("date")
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        else {
            return false;
        };
        self.date_from.map_or(true, |from| date >= from) && self.date_to.map_or(true, |to| date <= to)
    }

    // Overlap: the record ends after the window opens and starts before it closes.
    fn matches_time(&self, metadata: &Metadata) -> bool {
        let ends_after = self.time_from.map_or(true, |from| {
            metadata.get("endTime").and_then(|t| parse_clock(t)).is_some_and(|end| end > from)
        });
        let starts_before = self.time_to.map_or(true, |to| {
            metadata.get("startTime").and_then(|t| parse_clock(t)).is_some_and(|start| start < to)
        });
        ends_after && starts_before
    }
}
