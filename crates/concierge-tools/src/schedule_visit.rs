//! schedule_visit: books a visit slot on the calendar and logs it.
//!
//! Every accepted request writes exactly one `visits` row: `created` with the
//! event id when the calendar booked it, `manual_followup` otherwise.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};
use concierge_core::config::VisitsConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::{AppendLog, Calendar, CalendarEvent, Tool};
use concierge_core::types::{MANUAL_FOLLOWUP, ToolDefinition, ToolResult};
use serde_json::{Value, json};

use crate::datetime::DateParser;
use crate::degrade::{self, Outcome};
use crate::registry::{field_str, missing_fields};

pub const VISITS_TABLE: &str = "visits";

/// Columns of the `visits` table.
pub const VISIT_COLUMNS: &[&str] = &[
    "created_at",
    "visit_id",
    "modality",
    "start_local",
    "end_local",
    "name",
    "email",
    "phone",
    "notes",
    "status",
    "event_id",
];

const REQUIRED: &[&str] = &[
    "modality",
    "preferred_dt_local",
    "contact.name",
    "contact.email",
    "contact.phone",
];

pub const STATUS_CREATED: &str = "created";

pub struct ScheduleVisitTool {
    calendar: Arc<dyn Calendar>,
    log: Arc<dyn AppendLog>,
    parser: DateParser,
    slot: Duration,
    time_zone: String,
}

/// A validated booking request.
struct Visit {
    id: String,
    modality: String,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    name: String,
    email: String,
    phone: String,
    notes: String,
}

impl Visit {
    fn event(&self, time_zone: &str) -> CalendarEvent {
        let mut description = format!(
            "Modality: {}\nName: {}\nEmail: {}\nPhone: {}",
            self.modality, self.name, self.email, self.phone
        );
        if !self.notes.is_empty() {
            description.push_str("\nNotes: ");
            description.push_str(&self.notes);
        }
        CalendarEvent {
            summary: format!("Visit ({}) - {}", self.modality, self.name),
            description,
            start: self.start,
            end: self.end,
            time_zone: time_zone.to_string(),
        }
    }

    fn row(&self, status: &str, event_id: &str) -> Vec<String> {
        let local = |dt: &DateTime<FixedOffset>| dt.format("%Y-%m-%d %H:%M").to_string();
        vec![
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            self.id.clone(),
            self.modality.clone(),
            local(&self.start),
            local(&self.end),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.notes.clone(),
            status.to_string(),
            event_id.to_string(),
        ]
    }
}

impl ScheduleVisitTool {
    pub fn new(calendar: Arc<dyn Calendar>, log: Arc<dyn AppendLog>, settings: &VisitsConfig) -> Result<Self> {
        if settings.slot_minutes <= 0 {
            return Err(ConciergeError::Config("visits.slot_minutes must be > 0".into()));
        }
        Ok(Self {
            calendar,
            log,
            parser: DateParser::new(&settings.datetime)?,
            slot: Duration::minutes(settings.slot_minutes),
            time_zone: settings.time_zone.clone(),
        })
    }

    async fn append_row(&self, visit: &Visit, status: &str, event_id: &str) -> Result<()> {
        self.log.append(VISITS_TABLE, visit.row(status, event_id)).await
    }
}

#[async_trait]
impl Tool for ScheduleVisitTool {
    fn name(&self) -> &str {
        "schedule_visit"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "schedule_visit".into(),
            description: "Book a visit at the user's preferred local date and time. \
                Requires the visit modality and the visitor's name, email and phone."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "modality": {
                        "type": "string",
                        "description": "How the visit happens, e.g. in_person or video_call"
                    },
                    "preferred_dt_local": {
                        "type": "string",
                        "description": "Preferred local date and time, ISO-8601 (2025-07-01T15:00) or day/month/year hour (01/07/2025 15:00)"
                    },
                    "contact": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "email": { "type": "string" },
                            "phone": { "type": "string" }
                        },
                        "required": ["name", "email", "phone"]
                    },
                    "notes": { "type": "string", "description": "Optional notes for the team" }
                },
                "required": ["modality", "preferred_dt_local", "contact"]
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult> {
        let missing = missing_fields(arguments, REQUIRED.iter().copied());
        if !missing.is_empty() {
            tracing::debug!("schedule_visit rejected, missing {:?}", missing);
            return Ok(ToolResult::invalid("missing_fields", json!({ "missing": missing })));
        }

        let get = |key: &str| field_str(arguments, key).unwrap_or_default();
        let raw_dt = get("preferred_dt_local");
        let start = match self.parser.parse(&raw_dt) {
            Ok(start) => start,
            Err(e) => {
                tracing::debug!("schedule_visit rejected: {e}");
                return Ok(ToolResult::invalid("invalid_datetime", json!({ "value": raw_dt })));
            }
        };

        let visit = Visit {
            id: uuid::Uuid::new_v4().to_string(),
            modality: get("modality"),
            start,
            end: start + self.slot,
            name: get("contact.name"),
            email: get("contact.email"),
            phone: get("contact.phone"),
            notes: get("notes"),
        };
        let event = visit.event(&self.time_zone);

        let outcome = degrade::or_manual_followup(
            "calendar booking",
            self.calendar.create_event(&event),
            || self.append_row(&visit, MANUAL_FOLLOWUP, ""),
        )
        .await;

        let Outcome::Done(event_id) = outcome else {
            return Ok(ToolResult::manual_followup());
        };

        // The booking exists; a lost log row does not undo it.
        if let Err(e) = self.append_row(&visit, STATUS_CREATED, &event_id).await {
            tracing::warn!("⚠️ Visit {} booked but not logged: {e}", visit.id);
        }
        tracing::info!("📅 Visit scheduled: {} at {}", visit.id, visit.start);

        Ok(ToolResult::success(json!({
            "eventId": event_id,
            "start": visit.start.to_rfc3339_opts(SecondsFormat::Secs, false),
            "end": visit.end.to_rfc3339_opts(SecondsFormat::Secs, false),
        })))
    }
}
