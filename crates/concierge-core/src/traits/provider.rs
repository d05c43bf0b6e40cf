//! Completion provider trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Message, ProviderResponse, ToolDefinition};

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            max_tokens: 800,
        }
    }
}

/// A language model that turns a conversation plus tool schema into one
/// assistant message.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<ProviderResponse>;
}
