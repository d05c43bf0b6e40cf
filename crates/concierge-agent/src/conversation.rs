//! Per-request conversation state.

use concierge_core::types::{Message, ToolCall};

/// Ordered messages of one request. Only grows; dropped when the request ends.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: &str, user_message: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_message)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_tool_calls(&mut self, content: String, calls: Vec<ToolCall>) {
        self.messages.push(Message::assistant_tool_calls(content, calls));
    }

    pub fn push_tool_result(&mut self, call_id: &str, output: String) {
        self.messages.push(Message::tool(output, call_id));
    }
}

/// Cut `output` to `max_chars` characters plus a marker. `0` disables the bound.
pub fn truncate_output(output: String, max_chars: usize) -> String {
    if max_chars == 0 {
        return output;
    }
    let total = output.chars().count();
    if total <= max_chars {
        return output;
    }
    let kept: String = output.chars().take(max_chars).collect();
    format!("{kept}...\n[truncated, {total} total chars]")
}
