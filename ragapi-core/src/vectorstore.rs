//! Vector store trait for storing and searching vector embeddings.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{DocumentId, ScoredDocument};
use crate::error::{RagError, Result};

/// The similarity metric a store ranks by.
///
/// Chosen once when the store is constructed; inserts and searches always
/// use the same metric. Scores are oriented so that higher means closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
    /// `1 / (1 + d)` where `d` is the Euclidean distance, in `(0, 1]`.
    Euclidean,
    /// Raw dot product.
    InnerProduct,
}

impl SimilarityMetric {
    /// Score `a` against `b`. Both slices must have the same length.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => cosine_similarity(a, b),
            SimilarityMetric::Euclidean => {
                let dist: f32 =
                    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
                1.0 / (1.0 + dist)
            }
            SimilarityMetric::InnerProduct => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Euclidean => "euclidean",
            SimilarityMetric::InnerProduct => "inner_product",
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimilarityMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(SimilarityMetric::Cosine),
            "euclidean" | "l2" => Ok(SimilarityMetric::Euclidean),
            "inner_product" | "dot" => Ok(SimilarityMetric::InnerProduct),
            other => Err(RagError::ConfigError(format!("unknown similarity metric '{other}'"))),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A storage backend for documents and their embeddings with similarity search.
///
/// Every store has a fixed dimensionality `D` and a fixed
/// [`SimilarityMetric`]. Inserting a vector of any other length fails before
/// anything is written, so searches never hand back a mismatched embedding.
///
/// # Example
///
/// ```rust,ignore
/// use ragapi_core::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new(384);
/// let id = store.insert("some text", &embedding, "docs").await?;
/// let results = store.search(&query_embedding, Some("docs"), 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist a new document and return its identifier.
    ///
    /// Each call is one independent atomic write; concurrent callers are safe.
    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        source_tag: &str,
    ) -> Result<DocumentId>;

    /// Return at most `k` documents ordered by descending similarity to
    /// `embedding`, restricted to `source_tag` when one is given.
    ///
    /// Having fewer than `k` qualifying documents (including none) is not an
    /// error.
    async fn search(
        &self,
        embedding: &[f32],
        source_tag: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;

    /// The fixed embedding dimensionality of this store.
    fn dimensions(&self) -> usize;

    /// The fixed similarity metric of this store.
    fn metric(&self) -> SimilarityMetric;
}

/// Fail with a [`RagError::StorageError`] unless `actual == expected`.
pub(crate) fn check_dimensions(backend: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RagError::storage(
            backend,
            format!("embedding dimension mismatch: expected {expected}, got {actual}"),
        ));
    }
    Ok(())
}
