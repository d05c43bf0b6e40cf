//! # Concierge Tools
//!
//! The functions the model may call: `search_kb`, `capture_lead` and
//! `schedule_visit`, plus the record and calendar backends they write to.
//!
//! [`ToolRegistry::execute`] never fails: malformed arguments, unknown tools
//! and unexpected errors all come back as `{"ok": false, "code": ...}`.

pub mod backends;
pub mod capture_lead;
pub mod datetime;
pub mod degrade;
pub mod registry;
pub mod schedule_visit;
pub mod search_kb;

use std::sync::Arc;

use concierge_core::config::ConciergeConfig;
use concierge_core::error::Result;
use concierge_core::traits::{AppendLog, Calendar, Tool};
use concierge_core::types::{ToolCall, ToolDefinition, ToolResult};
use concierge_knowledge::KnowledgeBase;
use serde_json::{Value, json};

pub use capture_lead::CaptureLeadTool;
pub use datetime::DateParser;
pub use schedule_visit::ScheduleVisitTool;
pub use search_kb::SearchKbTool;

/// Tools available to the agent, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three built-in tools wired to their collaborators.
    pub fn with_defaults(
        config: &ConciergeConfig,
        kb: Arc<KnowledgeBase>,
        log: Arc<dyn AppendLog>,
        calendar: Arc<dyn Calendar>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchKbTool::new(kb)));
        registry.register(Arc::new(CaptureLeadTool::new(log.clone(), config.leads.clone())));
        registry.register(Arc::new(ScheduleVisitTool::new(calendar, log, &config.visits)?));
        Ok(registry)
    }

    /// Register a tool; a tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one model-requested call.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let name = call.function.name.as_str();
        let Some(tool) = self.get(name) else {
            tracing::warn!("⚠️ Model requested unknown tool '{name}'");
            return ToolResult::failure_with("unknown_tool", json!({ "tool": name }));
        };

        let args = match parse_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(reason) => {
                tracing::warn!("⚠️ Invalid arguments for {name}: {reason}");
                return ToolResult::failure_with("invalid_arguments", json!({ "error": reason }));
            }
        };

        tracing::debug!("🔧 {name}({args})");
        match tool.execute(&args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("❌ Tool {name} failed: {e}");
                ToolResult::failure_with("tool_error", json!({ "error": e.to_string() }))
            }
        }
    }
}

/// Arguments must be a JSON object; an empty string counts as `{}`.
fn parse_arguments(raw: &str) -> std::result::Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v) if v.is_object() => Ok(v),
        Ok(_) => Err("arguments must be a JSON object".into()),
        Err(e) => Err(e.to_string()),
    }
}
