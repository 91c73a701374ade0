//! In-memory vector store.
//!
//! This module provides [`InMemoryVectorStore`], a dependency-free vector
//! store backed by a `Vec` protected by a `tokio::sync::RwLock`. It is
//! suitable for development, testing, and small-scale use cases.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Document, DocumentId, ScoredDocument};
use crate::error::Result;
use crate::vectorstore::{SimilarityMetric, VectorStore, check_dimensions};

const BACKEND: &str = "InMemory";

/// An in-memory vector store with exhaustive (exact) search.
///
/// Documents are kept in insertion order, which also breaks score ties.
/// Writers take the lock only for the push, so a search may or may not see an
/// insert that is committing concurrently.
///
/// # Example
///
/// ```rust,ignore
/// use ragapi_core::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new(384);
/// store.insert("hello", &embedding, "notes").await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimensions: usize,
    metric: SimilarityMetric,
    documents: RwLock<Vec<Document>>,
}

impl InMemoryVectorStore {
    /// Create an empty store for `dimensions`-long vectors ranked by cosine similarity.
    pub fn new(dimensions: usize) -> Self {
        Self::with_metric(dimensions, SimilarityMetric::Cosine)
    }

    /// Create an empty store with an explicit metric.
    pub fn with_metric(dimensions: usize, metric: SimilarityMetric) -> Self {
        Self { dimensions, metric, documents: RwLock::new(Vec::new()) }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        source_tag: &str,
    ) -> Result<DocumentId> {
        check_dimensions(BACKEND, self.dimensions, embedding.len())?;

        let document = Document {
            id: DocumentId::new(),
            content: content.to_string(),
            embedding: embedding.to_vec(),
            source_tag: source_tag.to_string(),
        };
        let id = document.id;

        self.documents.write().await.push(document);
        debug!(backend = BACKEND, %id, source_tag, "inserted document");
        Ok(id)
    }

    async fn search(
        &self,
        embedding: &[f32],
        source_tag: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        check_dimensions(BACKEND, self.dimensions, embedding.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let mut scored: Vec<ScoredDocument> = documents
            .iter()
            .filter(|doc| source_tag.is_none_or(|tag| doc.source_tag == tag))
            .map(|doc| ScoredDocument {
                document: doc.clone(),
                score: self.metric.score(&doc.embedding, embedding),
            })
            .collect();
        drop(documents);

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.read().await.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}
