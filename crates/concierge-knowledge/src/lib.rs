//! # Concierge Knowledge Base
//!
//! Small private RAG index held entirely in memory.
//!
//! ## Design
//! - **Chunking**: overlapping fixed-size character windows per document
//! - **Embeddings**: batched calls to the configured `Embedder`
//! - **Cosine similarity**: full linear scan, stable ordering on ties
//! - **Atomic rebuild**: a new index is built off to the side and swapped in
//!
//! ## How it works
//! ```text
//! documents ─► chunker ─► embedder (batches ≤ cap) ─► VectorIndex
//!                                                        │ swap
//! search_kb("opening hours") ─► embed query ─► KnowledgeBase (Arc snapshot)
//!                                                        │ cosine scan
//!                                                 top-k SearchHit
//! ```

pub mod chunker;
pub mod index;
pub mod source;
pub mod store;

pub use index::{Chunk, SearchHit, VectorIndex};
pub use source::{Document, load_documents};
pub use store::{BuildStats, KnowledgeBase};
