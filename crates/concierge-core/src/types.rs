//! Conversation and tool-calling types exchanged with the completion provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in a conversation, in the OpenAI chat wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message carrying the tool calls it requested.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    /// Tool result message tagged with the originating call id.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub r#type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".into()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            r#type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool schema advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Raw assistant message returned by a completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl ProviderResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some("tool_calls".into()),
            ..Default::default()
        }
    }

    /// Classify the response for the orchestrator's decide step.
    pub fn into_turn(self) -> AssistantTurn {
        if self.tool_calls.is_empty() {
            AssistantTurn::FinalReply(self.content.unwrap_or_default())
        } else {
            AssistantTurn::ToolRequests {
                content: self.content.unwrap_or_default(),
                calls: self.tool_calls,
            }
        }
    }
}

/// What the assistant asked for in one completion step.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantTurn {
    FinalReply(String),
    ToolRequests { content: String, calls: Vec<ToolCall> },
}

/// Outcome of one tool execution. Serialized flat: `{"ok": bool, ...payload}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub ok: bool,
    pub payload: Map<String, Value>,
}

/// Status reported when a side effect was deferred to a human.
pub const MANUAL_FOLLOWUP: &str = "manual_followup";

impl ToolResult {
    /// Successful result. `payload` must be a JSON object; other values are
    /// stored under `"data"`.
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            payload: into_object(payload),
        }
    }

    pub fn failure(code: &str) -> Self {
        Self::failure_with(code, json!({}))
    }

    /// Failure carrying a machine-readable `code` plus extra fields.
    pub fn failure_with(code: &str, details: Value) -> Self {
        let mut payload = into_object(details);
        payload.insert("code".into(), Value::String(code.into()));
        Self { ok: false, payload }
    }

    /// Validation failure (bad request equivalent); no side effect was run.
    pub fn invalid(code: &str, details: Value) -> Self {
        let mut result = Self::failure_with(code, details);
        result.payload.insert("status".into(), json!(400));
        result
    }

    /// The action was logged for a human to complete later.
    pub fn manual_followup() -> Self {
        let mut payload = Map::new();
        payload.insert("status".into(), Value::String(MANUAL_FOLLOWUP.into()));
        Self { ok: false, payload }
    }

    pub fn code(&self) -> Option<&str> {
        self.payload.get("code").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&Value> {
        self.payload.get("status")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::with_capacity(self.payload.len() + 1);
        obj.insert("ok".into(), Value::Bool(self.ok));
        for (k, v) in &self.payload {
            if k != "ok" {
                obj.insert(k.clone(), v.clone());
            }
        }
        Value::Object(obj)
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let v = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(v, json!({"role": "user", "content": "hi"}));

        let v = serde_json::to_value(Message::tool("{}", "call_1")).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call_1");
        assert!(v.get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_call_wire_shape() {
        let call = ToolCall::new("call_9", "search_kb", r#"{"query":"hours"}"#);
        let v = serde_json::to_value(Message::assistant_tool_calls("", vec![call])).unwrap();
        assert_eq!(v["tool_calls"][0]["type"], "function");
        assert_eq!(v["tool_calls"][0]["function"]["name"], "search_kb");
    }

    #[test]
    fn test_into_turn() {
        let turn = ProviderResponse::text("done").into_turn();
        assert_eq!(turn, AssistantTurn::FinalReply("done".into()));

        let call = ToolCall::new("c1", "capture_lead", "{}");
        match ProviderResponse::with_tool_calls(vec![call.clone()]).into_turn() {
            AssistantTurn::ToolRequests { calls, .. } => assert_eq!(calls, vec![call]),
            other => panic!("unexpected turn: {other:?}"),
        }
    }

    #[test]
    fn test_tool_result_flat_json() {
        let r = ToolResult::success(json!({"lead_id": "abc"}));
        assert_eq!(r.to_value(), json!({"ok": true, "lead_id": "abc"}));

        let r = ToolResult::manual_followup();
        assert_eq!(r.to_value(), json!({"ok": false, "status": "manual_followup"}));

        let r = ToolResult::invalid("missing_fields", json!({"missing": ["email"]}));
        assert_eq!(r.code(), Some("missing_fields"));
        assert_eq!(r.status(), Some(&json!(400)));
        assert!(!r.ok);
    }

    #[test]
    fn test_success_wraps_non_object() {
        let r = ToolResult::success(json!([1, 2]));
        assert_eq!(r.get("data"), Some(&json!([1, 2])));
    }
}
