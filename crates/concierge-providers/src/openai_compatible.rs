//! Unified OpenAI-compatible chat completion provider.
//!
//! A single struct that handles chat completions for all OpenAI-compatible APIs.
//! Different providers are distinguished only by endpoint URL, auth style, and API key.

use async_trait::async_trait;
use concierge_core::config::ConciergeConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::provider::{GenerateParams, Provider};
use concierge_core::types::{FunctionCall, Message, ProviderResponse, ToolCall, ToolDefinition, Usage};
use serde_json::{Value, json};

use crate::provider_registry::{AuthStyle, ProviderConfig};

/// A unified provider that works with any OpenAI-compatible API.
pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g., "openai", "groq", "deepseek").
    name: String,
    api_key: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Path for chat completions (e.g., "/chat/completions").
    chat_path: String,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create from a known provider config + ConciergeConfig.
    ///
    /// Resolution order:
    /// - API key: `config.llm.api_key` > `config.api_key` > env vars > empty
    /// - Base URL: `config.llm.endpoint` > env override > registry default
    pub fn from_registry(registry: &ProviderConfig, config: &ConciergeConfig) -> Result<Self> {
        let api_key = registry.resolve_api_key(&[&config.llm.api_key, &config.api_key]);
        let base_url = registry.resolve_base_url(&config.llm.endpoint);

        Ok(Self {
            name: registry.name.to_string(),
            api_key,
            base_url,
            chat_path: registry.chat_path.to_string(),
            auth_style: registry.auth_style,
            client: build_client(config.llm.timeout_secs)?,
        })
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &str, config: &ConciergeConfig) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();

        let api_key = if !config.llm.api_key.is_empty() {
            config.llm.api_key.clone()
        } else if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };

        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            auth_style,
            client: build_client(config.llm.timeout_secs)?,
        })
    }

    /// Build the auth header for the request.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("Concierge/0.1")
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConciergeError::Http(format!("Client error: {e}")))
}

/// Build the request body in the standard OpenAI format.
pub fn build_request_body(
    messages: &[Message],
    tools: &[ToolDefinition],
    params: &GenerateParams,
) -> Result<Value> {
    let mut body = json!({
        "model": params.model,
        "temperature": params.temperature,
        "max_tokens": params.max_tokens,
        "messages": serde_json::to_value(messages)?,
    });

    if !tools.is_empty() {
        let tool_defs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = Value::Array(tool_defs);
        body["tool_choice"] = json!("auto");
    }
    Ok(body)
}

/// Parse a chat completion response body.
///
/// Tool calls keep the order the model listed them in. Arguments sent as a
/// JSON object instead of a string are re-encoded.
pub fn parse_chat_response(json: &Value) -> Result<ProviderResponse> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| ConciergeError::completion("No choices in response"))?;

    let content = choice["message"]["content"].as_str().map(String::from);

    let tool_calls = choice["message"]["tool_calls"]
        .as_array()
        .map(|tc| {
            tc.iter()
                .enumerate()
                .filter_map(|(i, t)| {
                    let name = t["function"]["name"].as_str()?.to_string();
                    let arguments = match &t["function"]["arguments"] {
                        Value::String(s) => s.clone(),
                        Value::Null => "{}".to_string(),
                        other => other.to_string(),
                    };
                    let id = t["id"]
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .unwrap_or_else(|| format!("call_{i}"));
                    Some(ToolCall {
                        id,
                        r#type: "function".to_string(),
                        function: FunctionCall { name, arguments },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = json["usage"].as_object().map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    Ok(ProviderResponse {
        content,
        tool_calls,
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        usage,
    })
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<ProviderResponse> {
        // For providers that require auth, check API key
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(ConciergeError::ApiKeyMissing(self.name.clone()));
        }

        let body = build_request_body(messages, tools, params)?;
        let url = format!("{}{}", self.base_url, self.chat_path);
        let req = self.apply_auth(self.client.post(&url).json(&body));

        tracing::debug!(
            "{} chat: {} message(s), {} tool(s)",
            self.name,
            messages.len(),
            tools.len()
        );

        let resp = req.send().await.map_err(|e| ConciergeError::Completion {
            status: None,
            body: format!("{} connection failed ({}): {}", self.name, url, e),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ConciergeError::Completion {
                status: Some(status.as_u16()),
                body: format!("{} API error: {}", self.name, text),
            });
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ConciergeError::completion(format!("Bad JSON from {}: {e}", self.name)))?;

        let response = parse_chat_response(&json)?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                "{} usage: {} prompt + {} completion tokens",
                self.name,
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_body_with_tools() {
        let messages = vec![Message::system("be nice"), Message::user("hours?")];
        let tools = vec![ToolDefinition {
            name: "search_kb".into(),
            description: "search".into(),
            parameters: json!({"type": "object"}),
        }];
        let body = build_request_body(&messages, &tools, &GenerateParams::default()).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_kb");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn test_build_request_body_without_tools() {
        let body =
            build_request_body(&[Message::user("hi")], &[], &GenerateParams::default()).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let json = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "We open at 9."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let resp = parse_chat_response(&json).unwrap();
        assert_eq!(resp.content.as_deref(), Some("We open at 9."));
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_tool_calls_in_order() {
        let json = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function",
                         "function": {"name": "capture_lead", "arguments": "{\"full_name\":\"Ana\"}"}},
                        {"id": "b", "type": "function",
                         "function": {"name": "schedule_visit", "arguments": {"modality": "in_person"}}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let resp = parse_chat_response(&json).unwrap();
        assert_eq!(resp.content, None);
        assert_eq!(resp.tool_calls.len(), 2);
        assert_eq!(resp.tool_calls[0].function.name, "capture_lead");
        assert_eq!(resp.tool_calls[1].id, "b");
        let args: Value = serde_json::from_str(&resp.tool_calls[1].function.arguments).unwrap();
        assert_eq!(args["modality"], "in_person");
    }

    #[test]
    fn test_parse_missing_choices() {
        let err = parse_chat_response(&json!({"error": "x"})).unwrap_err();
        assert!(matches!(err, ConciergeError::Completion { .. }));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let registry = crate::provider_registry::get_provider_config("openai").unwrap();
        let mut provider =
            OpenAiCompatibleProvider::from_registry(registry, &ConciergeConfig::default()).unwrap();
        provider.api_key.clear();
        let err = provider
            .chat(&[Message::user("hi")], &[], &GenerateParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::ApiKeyMissing(_)));
    }
}
