//! Side-effect collaborators: the append-only record log and the calendar.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::error::Result;

/// Append-only, spreadsheet-like log of fixed-column rows.
#[async_trait]
pub trait AppendLog: Send + Sync {
    fn name(&self) -> &str;

    async fn append(&self, table: &str, row: Vec<String>) -> Result<()>;
}

/// An event to book on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// IANA zone name passed through to the provider.
    pub time_zone: String,
}

/// Calendar booking provider. Returns the created event id.
#[async_trait]
pub trait Calendar: Send + Sync {
    fn name(&self) -> &str;

    async fn create_event(&self, event: &CalendarEvent) -> Result<String>;
}
