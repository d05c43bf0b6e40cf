//! KnowledgeBase: the live, atomically swappable vector index.
//!
//! Readers clone the current `Arc<VectorIndex>` and release the lock right
//! away, so a rebuild never blocks a search and a search never observes a
//! partially built index.

use std::sync::{Arc, RwLock};

use concierge_core::config::KnowledgeConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::Embedder;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::chunker;
use crate::index::{Chunk, SearchHit, VectorIndex};
use crate::source::Document;

/// Summary of one index build.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub batches: usize,
    pub dimension: usize,
}

pub struct KnowledgeBase {
    current: RwLock<Arc<VectorIndex>>,
    embedder: Arc<dyn Embedder>,
    settings: KnowledgeConfig,
    embed_concurrency: usize,
    /// Serializes rebuilds; searches never take it.
    build_lock: tokio::sync::Mutex<()>,
}

impl KnowledgeBase {
    /// Create with an empty index.
    pub fn new(embedder: Arc<dyn Embedder>, settings: KnowledgeConfig) -> Result<Self> {
        chunker::windows("", settings.chunk_size, settings.chunk_overlap)?;
        if settings.max_top_k == 0 {
            return Err(ConciergeError::Config("max_top_k must be >= 1".into()));
        }
        Ok(Self {
            current: RwLock::new(Arc::new(VectorIndex::empty())),
            embedder,
            settings,
            embed_concurrency: 1,
            build_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Number of embedding batches in flight during a build.
    pub fn with_embed_concurrency(mut self, n: usize) -> Self {
        self.embed_concurrency = n.max(1);
        self
    }

    pub fn settings(&self) -> &KnowledgeConfig {
        &self.settings
    }

    /// Snapshot of the live index.
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    fn swap(&self, next: VectorIndex) {
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(next);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Replace the live index with one built from `documents`.
    ///
    /// On any failure the previous index stays live.
    pub async fn build(&self, documents: &[Document]) -> Result<BuildStats> {
        let _guard = self.build_lock.lock().await;
        let started = std::time::Instant::now();

        let mut pending: Vec<(usize, String)> = Vec::new();
        for (doc_idx, doc) in documents.iter().enumerate() {
            for text in
                chunker::chunk(&doc.body, self.settings.chunk_size, self.settings.chunk_overlap)?
            {
                pending.push((doc_idx, text));
            }
        }

        let batch_size = self.embedder.max_batch().max(1);
        let texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
        let batches: Vec<Vec<String>> = texts.chunks(batch_size).map(|b| b.to_vec()).collect();
        let batch_count = batches.len();

        let embedder = &self.embedder;
        let embedded: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|batch| async move {
                let vectors = embedder.embed_batch(&batch).await?;
                if vectors.len() != batch.len() {
                    return Err(ConciergeError::embedding(format!(
                        "{} returned {} vectors for {} inputs",
                        embedder.name(),
                        vectors.len(),
                        batch.len()
                    )));
                }
                Ok::<_, ConciergeError>(vectors)
            })
            .buffered(self.embed_concurrency)
            .try_collect()
            .await
            .inspect_err(|e| tracing::error!("❌ Knowledge build aborted: {e}"))?;

        let chunks: Vec<Chunk> = pending
            .into_iter()
            .zip(embedded.into_iter().flatten())
            .map(|((doc_idx, text), vector)| {
                let doc = &documents[doc_idx];
                Chunk {
                    source_title: doc.title.clone(),
                    source_url: doc.canonical_url.clone().unwrap_or_default(),
                    updated_at: doc.updated_at.clone().unwrap_or_default(),
                    text,
                    vector,
                }
            })
            .collect();

        let index = VectorIndex::from_chunks(chunks)?;
        let stats = BuildStats {
            documents: documents.len(),
            chunks: index.len(),
            batches: batch_count,
            dimension: index.dimension(),
        };
        self.swap(index);

        tracing::info!(
            "📚 Knowledge index built: {} document(s), {} chunk(s), {} batch(es) in {:?}",
            stats.documents,
            stats.chunks,
            stats.batches,
            started.elapsed()
        );
        Ok(stats)
    }

    /// Top-k hits for `query`; `k` is clamped to `[1, max_top_k]`.
    ///
    /// An empty index returns no hits without calling the embedder.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let index = self.snapshot();
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let k = k.clamp(1, self.settings.max_top_k);

        let mut vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(ConciergeError::embedding(format!(
                "expected 1 query vector, got {}",
                vectors.len()
            )));
        }
        let query_vector = vectors.swap_remove(0);

        let hits = index.search_vector(&query_vector, k)?;
        tracing::debug!("Knowledge search: {} hit(s) of {} chunk(s)", hits.len(), index.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bag-of-character-codes: counts of each byte value, folded into 64 slots.
    struct CharBagEmbedder {
        calls: AtomicUsize,
        max_seen: AtomicUsize,
        cap: usize,
    }

    impl CharBagEmbedder {
        fn new(cap: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
                cap,
            }
        }
    }

    fn char_bag(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; 64];
        for b in text.to_lowercase().bytes() {
            v[(b % 64) as usize] += 1.0;
        }
        v
    }

    #[async_trait]
    impl Embedder for CharBagEmbedder {
        fn name(&self) -> &str {
            "char-bag"
        }

        fn max_batch(&self) -> usize {
            self.cap
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.max_seen.fetch_max(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| char_bag(t)).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        fn max_batch(&self) -> usize {
            8
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(ConciergeError::Embedding {
                status: Some(500),
                message: "upstream down".into(),
            })
        }
    }

    fn settings(chunk_size: usize, overlap: usize) -> KnowledgeConfig {
        KnowledgeConfig {
            chunk_size,
            chunk_overlap: overlap,
            ..KnowledgeConfig::default()
        }
    }

    fn doc(title: &str, body: &str) -> Document {
        Document {
            title: title.into(),
            canonical_url: Some(format!("https://example.com/{title}")),
            updated_at: Some("2025-06-01".into()),
            body: body.into(),
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            doc("hours", "We are open Monday to Friday from nine to six."),
            doc("parking", "Free parking is available behind the building."),
            doc("pets", "Small pets are welcome in the garden area only."),
        ]
    }

    #[tokio::test]
    async fn test_exact_query_ranks_its_chunk_first() {
        let kb = KnowledgeBase::new(Arc::new(CharBagEmbedder::new(64)), settings(200, 20)).unwrap();
        kb.build(&docs()).await.unwrap();

        let hits = kb
            .search("Free parking is available behind the building.", 3)
            .await
            .unwrap();
        assert_eq!(hits[0].title, "parking");
        assert!((hits[0].score - 1.0).abs() < 1e-4);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedder() {
        let embedder = Arc::new(CharBagEmbedder::new(64));
        let kb = KnowledgeBase::new(embedder.clone(), KnowledgeConfig::default()).unwrap();
        let stats = kb.build(&[]).await.unwrap();
        assert_eq!(stats.chunks, 0);

        let hits = kb.search("anything", 4).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batches_respect_cap() {
        let embedder = Arc::new(CharBagEmbedder::new(3));
        let kb = KnowledgeBase::new(embedder.clone(), settings(10, 2))
            .unwrap()
            .with_embed_concurrency(2);
        let stats = kb.build(&docs()).await.unwrap();

        assert!(stats.chunks > 3);
        assert_eq!(stats.batches, stats.chunks.div_ceil(3));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), stats.batches);
        assert!(embedder.max_seen.load(Ordering::SeqCst) <= 3);
        assert_eq!(stats.dimension, 64);
    }

    #[tokio::test]
    async fn test_chunks_keep_document_metadata_in_order() {
        let kb = KnowledgeBase::new(Arc::new(CharBagEmbedder::new(2)), settings(16, 4))
            .unwrap()
            .with_embed_concurrency(3);
        kb.build(&docs()).await.unwrap();

        let snapshot = kb.snapshot();
        let titles: Vec<_> = snapshot.chunks().iter().map(|c| c.source_title.as_str()).collect();
        let mut sorted = titles.clone();
        sorted.sort_by_key(|t| ["hours", "parking", "pets"].iter().position(|x| x == t));
        assert_eq!(titles, sorted);
        for c in snapshot.chunks() {
            assert_eq!(c.vector, char_bag(&c.text));
            assert_eq!(c.source_url, format!("https://example.com/{}", c.source_title));
        }
    }

    #[tokio::test]
    async fn test_k_is_clamped() {
        let kb = KnowledgeBase::new(Arc::new(CharBagEmbedder::new(64)), settings(12, 2)).unwrap();
        kb.build(&docs()).await.unwrap();
        assert!(kb.len() > 6);

        assert_eq!(kb.search("parking", 100).await.unwrap().len(), 6);
        assert_eq!(kb.search("parking", 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_index() {
        let kb = KnowledgeBase::new(Arc::new(CharBagEmbedder::new(64)), settings(200, 20)).unwrap();
        kb.build(&docs()).await.unwrap();
        let before = kb.snapshot();

        let failing = KnowledgeBase {
            current: RwLock::new(before.clone()),
            embedder: Arc::new(FailingEmbedder),
            settings: settings(200, 20),
            embed_concurrency: 1,
            build_lock: tokio::sync::Mutex::new(()),
        };
        let err = failing.build(&docs()).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Embedding { status: Some(500), .. }));
        assert!(Arc::ptr_eq(&failing.snapshot(), &before));
    }

    #[tokio::test]
    async fn test_search_embedding_error_surfaces() {
        let kb = KnowledgeBase::new(Arc::new(FailingEmbedder), settings(200, 20)).unwrap();
        kb.swap(
            VectorIndex::from_chunks(vec![Chunk {
                source_title: "t".into(),
                source_url: String::new(),
                updated_at: String::new(),
                text: "x".into(),
                vector: vec![1.0],
            }])
            .unwrap(),
        );
        assert!(kb.search("x", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_rebuild_swaps_whole_index() {
        let kb = KnowledgeBase::new(Arc::new(CharBagEmbedder::new(64)), settings(200, 20)).unwrap();
        kb.build(&docs()).await.unwrap();
        let old = kb.snapshot();
        assert_eq!(old.len(), 3);

        kb.build(&[doc("only", "A single document.")]).await.unwrap();
        // A reader holding the old snapshot still sees the full old index.
        assert_eq!(old.len(), 3);
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.search("single", 4).await.unwrap()[0].title, "only");
    }

    /// Char-bag vectors after a short pause per call.
    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        fn name(&self) -> &str {
            "slow"
        }

        fn max_batch(&self) -> usize {
            1
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(texts.iter().map(|t| char_bag(t)).collect())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_search_during_rebuild_sees_one_index() {
        let kb = Arc::new(KnowledgeBase::new(Arc::new(SlowEmbedder), settings(16, 4)).unwrap());
        kb.build(&docs()).await.unwrap();
        let old_titles = ["hours", "parking", "pets"];
        let new_docs = vec![
            doc("menu", "Lunch is served daily from noon until three in the afternoon."),
            doc("rooms", "Every room has a balcony facing the river and a small desk."),
        ];

        let builder = {
            let kb = kb.clone();
            tokio::spawn(async move { kb.build(&new_docs).await })
        };

        let mut saw_old = false;
        let mut results = Vec::new();
        while !builder.is_finished() {
            results.push(kb.search("open parking room", 6).await.unwrap());
        }
        builder.await.unwrap().unwrap();
        results.push(kb.search("open parking room", 6).await.unwrap());

        for hits in &results {
            assert_eq!(hits.len(), 6);
            let from_old = hits.iter().filter(|h| old_titles.contains(&h.title.as_str())).count();
            assert!(from_old == 0 || from_old == hits.len(), "mixed result: {hits:?}");
            saw_old |= from_old > 0;
        }
        assert!(saw_old);
        let last = results.last().unwrap();
        assert!(last.iter().all(|h| h.title == "menu" || h.title == "rooms"));
    }

    struct ExtraVectorEmbedder;

    #[async_trait]
    impl Embedder for ExtraVectorEmbedder {
        fn name(&self) -> &str {
            "extra"
        }

        fn max_batch(&self) -> usize {
            8
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0], vec![0.5]])
        }
    }

    #[tokio::test]
    async fn test_query_must_yield_one_vector() {
        let kb = KnowledgeBase::new(Arc::new(ExtraVectorEmbedder), settings(200, 20)).unwrap();
        kb.swap(
            VectorIndex::from_chunks(vec![Chunk {
                source_title: "t".into(),
                source_url: String::new(),
                updated_at: String::new(),
                text: "x".into(),
                vector: vec![1.0],
            }])
            .unwrap(),
        );
        let err = kb.search("x", 1).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Embedding { .. }));
    }

    #[test]
    fn test_invalid_settings() {
        let embedder: Arc<dyn Embedder> = Arc::new(CharBagEmbedder::new(4));
        assert!(KnowledgeBase::new(embedder.clone(), settings(10, 10)).is_err());
        let mut s = KnowledgeConfig::default();
        s.max_top_k = 0;
        assert!(KnowledgeBase::new(embedder, s).is_err());
    }
}
