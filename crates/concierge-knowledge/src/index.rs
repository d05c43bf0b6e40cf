//! In-memory vector index with cosine-similarity search.

use concierge_core::error::{ConciergeError, Result};
use serde::Serialize;

/// Added to the norm product so a zero vector scores 0 instead of NaN.
const EPSILON: f32 = 1e-8;

/// One embedded window of a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source_title: String,
    pub source_url: String,
    /// Opaque; passed through as given by the document source.
    pub updated_at: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub canonical_url: String,
    pub updated_at: String,
    pub snippet: String,
    pub score: f32,
}

/// Immutable set of chunks sharing one embedding dimension.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    dimension: usize,
}

impl VectorIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from chunks; every vector must have the same non-zero dimension.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self> {
        let dimension = match chunks.first() {
            Some(first) => first.vector.len(),
            None => return Ok(Self::empty()),
        };
        if dimension == 0 {
            return Err(ConciergeError::embedding("embedder returned empty vectors"));
        }
        if let Some((i, bad)) = chunks
            .iter()
            .enumerate()
            .find(|(_, c)| c.vector.len() != dimension)
        {
            return Err(ConciergeError::embedding(format!(
                "chunk {i} has dimension {} (expected {dimension})",
                bad.vector.len()
            )));
        }
        Ok(Self { chunks, dimension })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Top `k` chunks by descending cosine similarity to `query`.
    ///
    /// Full linear scan; equal scores keep insertion order.
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(ConciergeError::embedding(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine(query, query_norm, &c.vector)))
            .collect();
        // sort_by is stable: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let c = &self.chunks[i];
                SearchHit {
                    title: c.source_title.clone(),
                    canonical_url: c.source_url.clone(),
                    updated_at: c.updated_at.clone(),
                    snippet: c.text.clone(),
                    score,
                }
            })
            .collect())
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], query_norm: f32, v: &[f32]) -> f32 {
    let dot: f32 = query.iter().zip(v).map(|(a, b)| a * b).sum();
    dot / (query_norm * norm(v) + EPSILON)
}
