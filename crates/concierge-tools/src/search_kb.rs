//! search_kb: semantic search over the knowledge base.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::error::Result;
use concierge_core::traits::Tool;
use concierge_core::types::{ToolDefinition, ToolResult};
use concierge_knowledge::KnowledgeBase;
use serde_json::{Value, json};

pub struct SearchKbTool {
    kb: Arc<KnowledgeBase>,
}

impl SearchKbTool {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Tool for SearchKbTool {
    fn name(&self) -> &str {
        "search_kb"
    }

    fn definition(&self) -> ToolDefinition {
        let settings = self.kb.settings();
        ToolDefinition {
            name: "search_kb".into(),
            description: "Search the knowledge base for passages relevant to the user's question. \
                Use it before answering questions about the business."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for, in natural language"
                    },
                    "top_k": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": settings.max_top_k,
                        "description": format!("Number of passages to return (default: {})", settings.default_top_k)
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult> {
        let settings = self.kb.settings();
        let query: String = arguments["query"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .chars()
            .take(settings.max_query_chars)
            .collect();
        if query.is_empty() {
            return Ok(ToolResult::invalid("missing_fields", json!({ "missing": ["query"] })));
        }

        let top_k = arguments["top_k"]
            .as_u64()
            .map(|k| k as usize)
            .unwrap_or(settings.default_top_k)
            .clamp(1, settings.max_top_k);

        match self.kb.search(&query, top_k).await {
            Ok(hits) => {
                tracing::debug!("search_kb '{query}' → {} hit(s)", hits.len());
                Ok(ToolResult::success(json!({ "hits": hits })))
            }
            Err(e) => {
                tracing::warn!("⚠️ Knowledge search unavailable: {e}");
                Ok(ToolResult::failure("kb_unavailable"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::config::KnowledgeConfig;
    use concierge_core::error::ConciergeError;
    use concierge_core::traits::Embedder;
    use concierge_knowledge::Document;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Vowel counts; records every query it embeds.
    #[derive(Default)]
    struct VowelEmbedder {
        seen: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Embedder for VowelEmbedder {
        fn name(&self) -> &str {
            "vowels"
        }

        fn max_batch(&self) -> usize {
            16
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ConciergeError::embedding("offline"));
            }
            self.seen.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts
                .iter()
                .map(|t| {
                    "aeiou"
                        .chars()
                        .map(|v| t.chars().filter(|c| *c == v).count() as f32 + 0.1)
                        .collect()
                })
                .collect())
        }
    }

    fn docs() -> Vec<Document> {
        (0..8)
            .map(|i| Document {
                title: format!("doc {i}"),
                canonical_url: Some(format!("https://example.com/{i}")),
                updated_at: None,
                body: "a".repeat(i + 1) + &"o".repeat(8 - i),
            })
            .collect()
    }

    async fn tool_with(embedder: Arc<VowelEmbedder>) -> SearchKbTool {
        let kb = KnowledgeBase::new(embedder, KnowledgeConfig::default()).unwrap();
        kb.build(&docs()).await.unwrap();
        SearchKbTool::new(Arc::new(kb))
    }

    #[tokio::test]
    async fn test_hits_and_default_top_k() {
        let tool = tool_with(Arc::new(VowelEmbedder::default())).await;
        let result = tool.execute(&json!({"query": "aaaaaaaaa"})).await.unwrap();
        assert!(result.ok);
        let hits = result.get("hits").and_then(Value::as_array).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0]["title"], "doc 7");
        assert_eq!(hits[0]["canonical_url"], "https://example.com/7");
        assert_eq!(hits[0]["updated_at"], "");
        assert!(hits[0]["score"].as_f64().unwrap() >= hits[1]["score"].as_f64().unwrap());
    }

    #[tokio::test]
    async fn test_top_k_is_clamped() {
        let tool = tool_with(Arc::new(VowelEmbedder::default())).await;
        let result = tool.execute(&json!({"query": "ao", "top_k": 50})).await.unwrap();
        assert_eq!(result.get("hits").and_then(Value::as_array).unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_query_is_trimmed_and_clamped() {
        let embedder = Arc::new(VowelEmbedder::default());
        let tool = tool_with(embedder.clone()).await;
        let long = format!("   {}   ", "é".repeat(900));
        tool.execute(&json!({"query": long})).await.unwrap();

        let seen = embedder.seen.lock().unwrap();
        let query = seen.last().unwrap();
        assert_eq!(query.chars().count(), 500);
        assert!(query.starts_with('é'));
    }

    #[tokio::test]
    async fn test_blank_query_is_invalid() {
        let tool = tool_with(Arc::new(VowelEmbedder::default())).await;
        let result = tool.execute(&json!({"query": "   "})).await.unwrap();
        assert_eq!(result.code(), Some("missing_fields"));
        assert_eq!(result.status(), Some(&json!(400)));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_kb_unavailable() {
        let embedder = Arc::new(VowelEmbedder::default());
        let tool = tool_with(embedder.clone()).await;
        embedder.fail.store(true, Ordering::SeqCst);

        let result = tool.execute(&json!({"query": "opening hours"})).await.unwrap();
        assert_eq!(result.to_value(), json!({"ok": false, "code": "kb_unavailable"}));
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_hits() {
        let embedder = Arc::new(VowelEmbedder::default());
        embedder.fail.store(true, Ordering::SeqCst);
        let kb = KnowledgeBase::new(embedder, KnowledgeConfig::default()).unwrap();
        let tool = SearchKbTool::new(Arc::new(kb));

        let result = tool.execute(&json!({"query": "anything"})).await.unwrap();
        assert_eq!(result.to_value(), json!({"ok": true, "hits": []}));
    }
}
