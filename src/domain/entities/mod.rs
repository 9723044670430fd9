pub mod document;
pub mod schedule_event;
