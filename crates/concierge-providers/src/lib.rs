//! # Concierge Providers
//!
//! Completion and embedding clients for Concierge.
//!
//! All supported chat backends speak the OpenAI wire format and are handled by
//! one `OpenAiCompatibleProvider`; they differ only by endpoint, auth style and
//! API key. Optional fallbacks wrap the primary in a `FallbackChain`.

pub mod embeddings;
pub mod failover;
pub mod openai_compatible;
pub mod provider_registry;

use std::sync::Arc;

use concierge_core::config::ConciergeConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::{Embedder, Provider};

/// Create the completion provider from configuration.
///
/// Resolution order for the provider name:
/// 1. `config.llm.provider` (from `[llm]` section)
/// 2. `config.default_provider` (top-level field)
///
/// Any `[llm].fallbacks` are chained behind the primary.
pub fn create_provider(config: &ConciergeConfig) -> Result<Arc<dyn Provider>> {
    let primary = create_named_provider(config.llm_provider(), config)?;
    if config.llm.fallbacks.is_empty() {
        return Ok(Arc::from(primary));
    }

    let mut chain = vec![primary];
    for name in &config.llm.fallbacks {
        chain.push(create_named_provider(name, config)?);
    }
    tracing::info!("🔁 Completion failover chain: {} provider(s)", chain.len());
    Ok(Arc::new(failover::FallbackChain::new(chain)?))
}

fn create_named_provider(name: &str, config: &ConciergeConfig) -> Result<Box<dyn Provider>> {
    match name {
        // Custom endpoint: "custom:https://my-server.com/v1"
        other if other.starts_with("custom:") => Ok(Box::new(
            openai_compatible::OpenAiCompatibleProvider::custom(other, config)?,
        )),
        _ => {
            let registry = provider_registry::get_provider_config(name)
                .ok_or_else(|| {
                    ConciergeError::ProviderNotFound(format!(
                        "{name} (known: {}, custom:<url>)",
                        provider_registry::all_provider_names().join(", ")
                    ))
                })?;
            Ok(Box::new(
                openai_compatible::OpenAiCompatibleProvider::from_registry(registry, config)?,
            ))
        }
    }
}

/// Create the embedding client from configuration.
pub fn create_embedder(config: &ConciergeConfig) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(embeddings::OpenAiEmbedder::from_config(config)?))
}
