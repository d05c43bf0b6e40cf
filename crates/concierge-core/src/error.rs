//! Error taxonomy shared by every Concierge crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConciergeError>;

#[derive(Debug, Error)]
pub enum ConciergeError {
    /// Invalid configuration or index parameters. Fatal at startup/build time.
    #[error("Config error: {0}")]
    Config(String),

    /// The embedding capability failed; aborts the build or search that hit it.
    #[error("Embedding error{}: {message}", status_suffix(.status))]
    Embedding { status: Option<u16>, message: String },

    /// The completion capability failed; fatal for the current request.
    #[error("Completion error{}: {body}", status_suffix(.status))]
    Completion { status: Option<u16>, body: String },

    #[error("Invalid date/time: {0}")]
    InvalidDateTime(String),

    #[error("Missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    /// Append-log or calendar collaborator unavailable.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl ConciergeError {
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            status: None,
            message: message.into(),
        }
    }

    pub fn completion(body: impl Into<String>) -> Self {
        Self::Completion {
            status: None,
            body: body.into(),
        }
    }

    /// A completion failure another endpoint might not share: transport errors,
    /// timeouts, rate limits, 5xx and per-endpoint auth rejections.
    /// Any other 4xx rejects the request itself.
    pub fn is_endpoint_failure(&self) -> bool {
        match self {
            Self::Completion { status: None, .. } | Self::Http(_) | Self::ApiKeyMissing(_) => true,
            Self::Completion {
                status: Some(code), ..
            } => matches!(code, 401 | 403 | 408 | 429) || *code >= 500,
            _ => false,
        }
    }
}
