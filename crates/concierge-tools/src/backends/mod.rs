//! Record and calendar backends behind the `AppendLog` / `Calendar` seams.

pub mod calendar;
pub mod memory_log;
pub mod sqlite_log;
pub mod webhook_log;

use std::sync::Arc;

use concierge_core::config::{CalendarConfig, RecordsConfig, expand_path};
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::{AppendLog, Calendar};

pub use calendar::{HttpCalendar, UnavailableCalendar};
pub use memory_log::MemoryLog;
pub use sqlite_log::SqliteLog;
pub use webhook_log::WebhookLog;

/// Build the append log named by `records.backend`.
pub fn create_append_log(config: &RecordsConfig) -> Result<Arc<dyn AppendLog>> {
    match config.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteLog::open(&expand_path(&config.sqlite_path))?)),
        "webhook" => Ok(Arc::new(WebhookLog::new(
            config.webhook_url.clone(),
            Some(config.webhook_token.clone()),
            config.timeout_secs,
        )?)),
        "memory" => Ok(Arc::new(MemoryLog::new())),
        other => Err(ConciergeError::Config(format!(
            "Unknown records backend: '{other}'. Use sqlite, webhook or memory."
        ))),
    }
}

/// HTTP calendar when enabled and credentialed; otherwise bookings degrade.
pub fn create_calendar(config: &CalendarConfig) -> Result<Arc<dyn Calendar>> {
    if !config.enabled {
        tracing::info!("📅 Calendar disabled, visits will be logged for manual follow-up");
        return Ok(Arc::new(UnavailableCalendar));
    }
    if config.access_token.is_empty() {
        tracing::warn!("⚠️ Calendar enabled without an access token, visits will degrade");
        return Ok(Arc::new(UnavailableCalendar));
    }
    Ok(Arc::new(HttpCalendar::from_config(config)?))
}
