//! OpenAI-compatible embeddings client.

use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::ConciergeConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::Embedder;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::provider_registry::{self, AuthStyle};

/// Async embeddings client for any `/embeddings` endpoint in the OpenAI format.
pub struct OpenAiEmbedder {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    auth_style: AuthStyle,
    model: String,
    dimensions: Option<usize>,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn from_config(config: &ConciergeConfig) -> Result<Self> {
        let cfg = &config.embedding;
        let registry = provider_registry::get_provider_config(&cfg.provider)
            .ok_or_else(|| ConciergeError::ProviderNotFound(cfg.provider.clone()))?;
        let path = registry.embeddings_path.ok_or_else(|| {
            ConciergeError::Config(format!("provider '{}' has no embeddings API", registry.name))
        })?;
        let api_key = registry.resolve_api_key(&[&cfg.api_key, &config.api_key]);
        let base_url = registry.resolve_base_url(&cfg.endpoint);

        let client = reqwest::Client::builder()
            .user_agent("Concierge/0.1")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ConciergeError::Http(format!("Client error: {e}")))?;

        Ok(Self {
            name: registry.name.to_string(),
            client,
            endpoint: format!("{base_url}{path}"),
            api_key,
            auth_style: registry.auth_style,
            model: cfg.model.clone(),
            dimensions: cfg.dimensions,
            max_retries: cfg.max_retries.max(1),
            batch_size: cfg.batch_size.max(1),
        })
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(500 * (1 << capped))
    }

    async fn send_once(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, Attempt> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };
        let mut req = self.client.post(&self.endpoint).json(&request);
        if self.auth_style == AuthStyle::Bearer && !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(err) => {
                let retry = Self::is_retryable_error(&err);
                return Err(Attempt {
                    retry,
                    error: ConciergeError::Embedding {
                        status: None,
                        message: format!("{} request failed: {err}", self.name),
                    },
                });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Attempt {
                retry: Self::should_retry(status),
                error: ConciergeError::Embedding {
                    status: Some(status.as_u16()),
                    message: body,
                },
            });
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| Attempt {
            retry: false,
            error: ConciergeError::embedding(format!("failed to parse embedding response: {e}")),
        })?;
        order_embeddings(parsed, texts.len()).map_err(|error| Attempt { retry: false, error })
    }
}

struct Attempt {
    retry: bool,
    error: ConciergeError,
}

/// Sort response items by `index` and check one vector came back per input.
fn order_embeddings(mut parsed: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    parsed.data.sort_by_key(|entry| entry.index);
    if parsed.data.len() != expected {
        return Err(ConciergeError::embedding(format!(
            "endpoint returned {} embeddings for {} inputs",
            parsed.data.len(),
            expected
        )));
    }
    Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_batch(&self) -> usize {
        self.batch_size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > self.batch_size {
            return Err(ConciergeError::embedding(format!(
                "batch of {} exceeds configured max {}",
                texts.len(),
                self.batch_size
            )));
        }
        if self.auth_style == AuthStyle::Bearer && self.api_key.is_empty() {
            return Err(ConciergeError::embedding(format!("no API key for {}", self.name)));
        }

        let mut attempt = 0usize;
        loop {
            match self.send_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(failed) if failed.retry && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    let delay = Self::retry_backoff(attempt);
                    tracing::warn!(
                        "⚠️ Embedding batch failed (attempt {attempt}), retrying in {:?}: {}",
                        delay,
                        failed.error
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> EmbeddingResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_order_embeddings_sorts_by_index() {
        let parsed = response(serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        }));
        let vectors = order_embeddings(parsed, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_order_embeddings_count_mismatch() {
        let parsed = response(serde_json::json!({
            "data": [{"index": 0, "embedding": [1.0]}]
        }));
        assert!(matches!(
            order_embeddings(parsed, 2),
            Err(ConciergeError::Embedding { .. })
        ));
    }

    #[test]
    fn test_rejects_provider_without_embeddings() {
        let mut config = ConciergeConfig::default();
        config.embedding.provider = "groq".into();
        assert!(matches!(
            OpenAiEmbedder::from_config(&config),
            Err(ConciergeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected() {
        let mut config = ConciergeConfig::default();
        config.embedding.batch_size = 2;
        config.embedding.api_key = "sk-test".into();
        let embedder = OpenAiEmbedder::from_config(&config).unwrap();
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(embedder.embed_batch(&texts).await.is_err());
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_embedding_error() {
        let mut config = ConciergeConfig::default();
        config.embedding.api_key = "sk-test".into();
        let mut embedder = OpenAiEmbedder::from_config(&config).unwrap();
        embedder.api_key.clear();

        let err = embedder.embed_batch(&["hours".to_string()]).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Embedding { status: None, .. }));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(OpenAiEmbedder::retry_backoff(1), Duration::from_millis(1000));
        assert_eq!(OpenAiEmbedder::retry_backoff(9), Duration::from_millis(16000));
    }
}
