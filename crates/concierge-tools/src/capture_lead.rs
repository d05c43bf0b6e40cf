//! capture_lead: records a prospective customer's contact details.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use concierge_core::config::LeadsConfig;
use concierge_core::error::Result;
use concierge_core::traits::{AppendLog, Tool};
use concierge_core::types::{ToolDefinition, ToolResult};
use serde_json::{Value, json};

use crate::degrade::{self, Outcome};
use crate::registry::{field_str, missing_fields};

pub const LEADS_TABLE: &str = "leads";

/// Columns of the `leads` table.
pub const LEAD_COLUMNS: &[&str] = &[
    "created_at",
    "lead_id",
    "full_name",
    "email",
    "phone",
    "interest",
    "notes",
    "source",
];

const BASE_REQUIRED: &[&str] = &["full_name", "email", "phone"];

pub struct CaptureLeadTool {
    log: Arc<dyn AppendLog>,
    settings: LeadsConfig,
}

impl CaptureLeadTool {
    pub fn new(log: Arc<dyn AppendLog>, settings: LeadsConfig) -> Self {
        Self { log, settings }
    }

    fn required(&self) -> impl Iterator<Item = &str> {
        BASE_REQUIRED
            .iter()
            .copied()
            .chain(self.settings.extra_required.iter().map(String::as_str))
    }

    fn row(&self, lead_id: &str, args: &Value) -> Vec<String> {
        let get = |key: &str| field_str(args, key).unwrap_or_default();
        vec![
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            lead_id.to_string(),
            get("full_name"),
            get("email"),
            get("phone"),
            get("interest"),
            get("notes"),
            self.settings.source_tag.clone(),
        ]
    }
}

#[async_trait]
impl Tool for CaptureLeadTool {
    fn name(&self) -> &str {
        "capture_lead"
    }

    fn definition(&self) -> ToolDefinition {
        let required: Vec<&str> = self.required().collect();
        ToolDefinition {
            name: "capture_lead".into(),
            description: "Save a prospective customer's contact details so the team can follow up. \
                Only call this once the user has given their full name, email and phone."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "full_name": { "type": "string", "description": "Customer's full name" },
                    "email": { "type": "string", "description": "Contact email" },
                    "phone": { "type": "string", "description": "Contact phone number" },
                    "interest": { "type": "string", "description": "What they are interested in" },
                    "notes": { "type": "string", "description": "Anything else worth recording" }
                },
                "required": required
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult> {
        let missing = missing_fields(arguments, self.required());
        if !missing.is_empty() {
            tracing::debug!("capture_lead rejected, missing {:?}", missing);
            return Ok(ToolResult::invalid("missing_fields", json!({ "missing": missing })));
        }

        let lead_id = uuid::Uuid::new_v4().to_string();
        let row = self.row(&lead_id, arguments);
        let outcome =
            degrade::or_manual_followup("lead capture", self.log.append(LEADS_TABLE, row), degrade::no_fallback)
                .await;

        Ok(match outcome {
            Outcome::Done(()) => {
                tracing::info!("📝 Lead captured: {lead_id}");
                ToolResult::success(json!({ "lead_id": lead_id }))
            }
            Outcome::ManualFollowup => ToolResult::manual_followup(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryLog;
    use concierge_core::error::ConciergeError;

    struct BrokenLog;

    #[async_trait]
    impl AppendLog for BrokenLog {
        fn name(&self) -> &str {
            "broken"
        }

        async fn append(&self, _table: &str, _row: Vec<String>) -> Result<()> {
            Err(ConciergeError::Persistence("disk full".into()))
        }
    }

    fn lead() -> Value {
        json!({
            "full_name": "Ana Pérez",
            "email": "ana@example.com",
            "phone": 5491155550000u64,
            "interest": "2-bedroom unit"
        })
    }

    #[tokio::test]
    async fn test_success_appends_one_row() {
        let log = Arc::new(MemoryLog::new());
        let tool = CaptureLeadTool::new(log.clone(), LeadsConfig::default());

        let result = tool.execute(&lead()).await.unwrap();
        assert!(result.ok);
        let lead_id = result.get("lead_id").and_then(Value::as_str).unwrap().to_string();

        let rows = log.rows(LEADS_TABLE);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.len(), LEAD_COLUMNS.len());
        assert_eq!(row[1], lead_id);
        assert_eq!(row[2], "Ana Pérez");
        assert_eq!(row[4], "5491155550000");
        assert_eq!(row[5], "2-bedroom unit");
        assert_eq!(row[6], "");
        assert_eq!(row[7], "chat");
    }

    #[tokio::test]
    async fn test_missing_fields_appends_nothing() {
        let log = Arc::new(MemoryLog::new());
        let tool = CaptureLeadTool::new(log.clone(), LeadsConfig::default());

        let result = tool
            .execute(&json!({"full_name": "Ana", "email": "  "}))
            .await
            .unwrap();
        assert_eq!(
            result.to_value(),
            json!({"ok": false, "code": "missing_fields", "status": 400, "missing": ["email", "phone"]})
        );
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_extra_required_fields() {
        let log = Arc::new(MemoryLog::new());
        let settings = LeadsConfig {
            extra_required: vec!["interest".into()],
            ..LeadsConfig::default()
        };
        let tool = CaptureLeadTool::new(log.clone(), settings);
        assert_eq!(tool.definition().parameters["required"], json!(["full_name", "email", "phone", "interest"]));

        let mut args = lead();
        args["interest"] = json!("");
        let result = tool.execute(&args).await.unwrap();
        assert_eq!(result.get("missing"), Some(&json!(["interest"])));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_degrades() {
        let tool = CaptureLeadTool::new(Arc::new(BrokenLog), LeadsConfig::default());
        let result = tool.execute(&lead()).await.unwrap();
        assert_eq!(result.to_value(), json!({"ok": false, "status": "manual_followup"}));
    }
}
