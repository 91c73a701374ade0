//! The embedding seam: text in, fixed-length vector out.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into a vector of length [`dimensions`](EmbeddingProvider::dimensions).
///
/// Implementations wrap a remote embedding model behind a unified async
/// interface. Input text is forwarded as-is; truncation, if any, is the
/// model's business. Failures are reported as
/// [`RagError::EmbeddingError`](crate::RagError::EmbeddingError) and are never
/// retried here.
///
/// # Example
///
/// ```rust,ignore
/// use ragapi_core::EmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new(config)?;
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text. Stores reject vectors whose length is not `dimensions()`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The fixed length `D` of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;
}
