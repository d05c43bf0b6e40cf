//! HTTP webhook append log, e.g. a spreadsheet script endpoint.
//!
//! Each row is POSTed as `{"table": ..., "row": [...]}`.

use async_trait::async_trait;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::AppendLog;
use serde_json::{Value, json};

pub struct WebhookLog {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookLog {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ConciergeError::Config(
                "records.webhook_url is required for the webhook backend".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .user_agent("Concierge/0.1")
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConciergeError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url,
            token: token.filter(|t| !t.is_empty()),
        })
    }
}

pub fn webhook_payload(table: &str, row: &[String]) -> Value {
    json!({ "table": table, "row": row })
}

#[async_trait]
impl AppendLog for WebhookLog {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn append(&self, table: &str, row: Vec<String>) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&webhook_payload(table, &row));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ConciergeError::Persistence(format!("webhook send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::debug!("🌐 Webhook row appended to '{table}'");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(ConciergeError::Persistence(format!(
                "webhook error {status}: {body}"
            )))
        }
    }
}
