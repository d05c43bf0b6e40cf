//! Embedding capability trait.

use async_trait::async_trait;

use crate::error::Result;

/// Converts text into fixed-dimension vectors.
///
/// `embed_batch` returns one vector per input, in input order. Callers must
/// not send more than `max_batch()` texts per call.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn max_batch(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
