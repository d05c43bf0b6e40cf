//! Calendar collaborators.

use async_trait::async_trait;
use chrono::SecondsFormat;
use concierge_core::config::CalendarConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::{Calendar, CalendarEvent};
use serde_json::{Value, json};

/// Google-Calendar-style events API:
/// `POST {endpoint}/calendars/{calendar_id}/events` answering `{"id": ...}`.
pub struct HttpCalendar {
    client: reqwest::Client,
    events_url: reqwest::Url,
    access_token: String,
}

impl HttpCalendar {
    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        let mut events_url = reqwest::Url::parse(&config.endpoint).map_err(|e| {
            ConciergeError::Config(format!("Invalid calendar endpoint '{}': {e}", config.endpoint))
        })?;
        events_url
            .path_segments_mut()
            .map_err(|_| {
                ConciergeError::Config(format!("Calendar endpoint '{}' cannot be a base", config.endpoint))
            })?
            .pop_if_empty()
            .extend(["calendars", config.calendar_id.as_str(), "events"]);

        let client = reqwest::Client::builder()
            .user_agent("Concierge/0.1")
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConciergeError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            events_url,
            access_token: config.access_token.clone(),
        })
    }

    pub fn events_url(&self) -> &str {
        self.events_url.as_str()
    }
}

pub fn event_body(event: &CalendarEvent) -> Value {
    json!({
        "summary": event.summary,
        "description": event.description,
        "start": {
            "dateTime": event.start.to_rfc3339_opts(SecondsFormat::Secs, false),
            "timeZone": event.time_zone,
        },
        "end": {
            "dateTime": event.end.to_rfc3339_opts(SecondsFormat::Secs, false),
            "timeZone": event.time_zone,
        },
    })
}

#[async_trait]
impl Calendar for HttpCalendar {
    fn name(&self) -> &str {
        "http-calendar"
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String> {
        let resp = self
            .client
            .post(self.events_url.clone())
            .bearer_auth(&self.access_token)
            .json(&event_body(event))
            .send()
            .await
            .map_err(|e| ConciergeError::Persistence(format!("calendar request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConciergeError::Persistence(format!(
                "calendar error {status}: {body}"
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ConciergeError::Persistence(format!("calendar response: {e}")))?;
        let id = body["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConciergeError::Persistence("calendar response has no event id".into()))?;
        tracing::info!("📅 Calendar event created: {id}");
        Ok(id.to_string())
    }
}

/// Stands in when no calendar is configured; every booking degrades.
pub struct UnavailableCalendar;

#[async_trait]
impl Calendar for UnavailableCalendar {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn create_event(&self, _event: &CalendarEvent) -> Result<String> {
        Err(ConciergeError::Persistence("calendar not configured".into()))
    }
}
