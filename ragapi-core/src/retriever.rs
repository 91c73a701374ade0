//! Query-time retrieval: embed the query, then search the store.

use std::sync::Arc;

use tracing::debug;

use crate::context::RequestContext;
use crate::document::ScoredDocument;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, Stage};
use crate::vectorstore::VectorStore;

/// Composes an [`EmbeddingProvider`] and a [`VectorStore`].
///
/// Errors from either step are returned unchanged. Nothing is cached between
/// calls.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { embedding_provider, vector_store }
    }

    /// Return up to `k` documents most similar to `query`, optionally
    /// restricted to `source_tag`, best first.
    pub async fn retrieve(
        &self,
        ctx: &RequestContext,
        query: &str,
        source_tag: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let embedding = ctx.run(Stage::Embedding, self.embedding_provider.embed(query)).await?;
        debug!(dimensions = embedding.len(), "query embedded");

        let results =
            ctx.run(Stage::Storage, self.vector_store.search(&embedding, source_tag, k)).await?;
        debug!(result_count = results.len(), k, source_tag, "vector search completed");
        Ok(results)
    }
}
