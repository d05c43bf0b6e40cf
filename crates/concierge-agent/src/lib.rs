//! # Concierge Agent
//! The bounded model/tool loop.
//!
//! Each request starts from `[system, user]`, alternates completion calls with
//! tool execution, and stops at the first plain-text answer. After
//! `max_tool_rounds` tool rounds one last completion is made without tools; if
//! the model still asks for tools the canned fallback reply is returned.

pub mod conversation;

use std::sync::Arc;

use concierge_core::config::{AgentConfig, ConciergeConfig};
use concierge_core::error::Result;
use concierge_core::traits::Provider;
use concierge_core::traits::provider::GenerateParams;
use concierge_core::types::{AssistantTurn, ToolDefinition};
use concierge_tools::ToolRegistry;
use serde::Serialize;

use crate::conversation::{Conversation, truncate_output};

/// Final answer of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    /// Tool rounds executed.
    pub tool_rounds: usize,
    /// Tool calls executed across all rounds.
    pub tool_calls: usize,
    /// True when `text` is the canned fallback reply.
    pub fallback: bool,
}

pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    settings: AgentConfig,
    params: GenerateParams,
    /// Tool schema, built once.
    tool_defs: Vec<ToolDefinition>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        settings: AgentConfig,
        params: GenerateParams,
    ) -> Self {
        let tool_defs = tools.list();
        Self {
            provider,
            tools,
            settings,
            params,
            tool_defs,
        }
    }

    pub fn from_config(
        config: &ConciergeConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let params = GenerateParams {
            model: config.llm_model().to_string(),
            temperature: config.default_temperature,
            max_tokens: config.llm.max_tokens,
        };
        Self::new(provider, tools, config.agent.clone(), params)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model_name(&self) -> &str {
        &self.params.model
    }

    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tool_defs
    }

    /// Answer one user message. Completion errors abort the request.
    pub async fn respond(&self, user_message: &str) -> Result<Reply> {
        let max_rounds = self.settings.max_tool_rounds;
        let mut conversation = Conversation::new(&self.settings.system_prompt, user_message);
        let mut tool_rounds = 0;
        let mut tool_calls = 0;

        for round in 0..=max_rounds {
            // The completion after the last tool round gets no tools.
            let tools: &[ToolDefinition] = if round < max_rounds { &self.tool_defs } else { &[] };

            let response = self
                .provider
                .chat(conversation.messages(), tools, &self.params)
                .await
                .inspect_err(|e| tracing::error!("❌ Completion failed ({}): {e}", self.provider.name()))?;

            let (content, calls) = match response.into_turn() {
                AssistantTurn::FinalReply(text) if text.trim().is_empty() => {
                    tracing::warn!("⚠️ Model returned an empty reply, using fallback");
                    break;
                }
                AssistantTurn::FinalReply(text) => {
                    tracing::debug!(
                        "Reply after {tool_rounds} tool round(s), {} message(s)",
                        conversation.len()
                    );
                    return Ok(Reply {
                        text,
                        tool_rounds,
                        tool_calls,
                        fallback: false,
                    });
                }
                AssistantTurn::ToolRequests { content, calls } => (content, calls),
            };

            if round == max_rounds {
                tracing::warn!(
                    "⚠️ Tool round cap ({max_rounds}) reached with {} call(s) pending, using fallback",
                    calls.len()
                );
                break;
            }

            tool_rounds += 1;
            tracing::info!(
                "Tool round {}/{}: {} tool call(s)",
                tool_rounds,
                max_rounds,
                calls.len()
            );

            conversation.push_tool_calls(content, calls.clone());
            for call in &calls {
                tracing::info!(
                    "  → {} ({})",
                    call.function.name,
                    call.function.arguments.chars().take(100).collect::<String>()
                );
                let result = self.tools.execute(call).await;
                tool_calls += 1;
                let output = truncate_output(result.to_json(), self.settings.max_tool_output_chars);
                conversation.push_tool_result(&call.id, output);
            }
        }

        Ok(Reply {
            text: self.settings.fallback_reply.clone(),
            tool_rounds,
            tool_calls,
            fallback: true,
        })
    }
}
