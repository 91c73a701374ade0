//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] runs the two request flows:
//!
//! - **ingest**: embed → insert
//! - **query**: embed → search → augment → prompt → generate
//!
//! Both flows are straight lines. The first failing stage ends the request
//! with that stage's error; nothing is retried or resumed.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragapi_core::{RagPipeline, RagConfig, InMemoryVectorStore, RequestContext};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_llm))
//!     .vector_store(Arc::new(InMemoryVectorStore::new(1024)))
//!     .build()?;
//!
//! let ctx = RequestContext::with_timeout(Duration::from_secs(30));
//! pipeline.ingest(&ctx, "The Eiffel Tower is in Paris.").await?;
//! let answer = pipeline.query(&ctx, "Where is the Eiffel Tower?", "ollama").await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::context::RequestContext;
use crate::document::{DocumentId, ScoredDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result, Stage};
use crate::generation::GenerationProvider;
use crate::prompt::PromptBuilder;
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// The result of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    /// The query as received.
    pub query: String,
    /// The model's reply, passed through unmodified (may be empty).
    pub response: String,
    /// The documents the prompt was grounded on, best first.
    pub context: Vec<ScoredDocument>,
    /// `false` when retrieval found nothing and the model answered without context.
    pub grounded: bool,
}

/// The RAG pipeline orchestrator.
///
/// Holds only shared, read-only collaborators, so one instance can serve any
/// number of concurrent requests behind an `Arc`. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generation_provider: Arc<dyn GenerationProvider>,
    vector_store: Arc<dyn VectorStore>,
    retriever: Retriever,
    prompt_builder: PromptBuilder,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Ingest `text` under the configured default source tag.
    ///
    /// See [`ingest_with_tag`](Self::ingest_with_tag).
    pub async fn ingest(&self, ctx: &RequestContext, text: &str) -> Result<DocumentId> {
        self.ingest_with_tag(ctx, text, &self.config.source_tag).await
    }

    /// Ingest a single text: embed → insert.
    ///
    /// Either both steps succeed and one document is stored, or nothing is
    /// stored.
    ///
    /// # Errors
    ///
    /// - [`RagError::ValidationError`] for blank text or tag
    /// - [`RagError::EmbeddingError`] / [`RagError::StorageError`] from the stages
    /// - [`RagError::Timeout`] / [`RagError::Cancelled`] from `ctx`
    pub async fn ingest_with_tag(
        &self,
        ctx: &RequestContext,
        text: &str,
        source_tag: &str,
    ) -> Result<DocumentId> {
        require_text(text, "text")?;
        require_text(source_tag, "source_tag")?;

        let embedding =
            ctx.run(Stage::Embedding, self.embedding_provider.embed(text)).await.inspect_err(|e| {
                error!(stage = %Stage::Embedding, error = %e, "ingest failed");
            })?;
        debug!(dimensions = embedding.len(), "document embedded");

        let id = ctx
            .run(Stage::Storage, self.vector_store.insert(text, &embedding, source_tag))
            .await
            .inspect_err(|e| error!(stage = %Stage::Storage, error = %e, "ingest failed"))?;

        info!(document.id = %id, source_tag, text_len = text.len(), "ingested document");
        Ok(id)
    }

    /// Retrieve up to `k` documents for `query` without generating.
    pub async fn retrieve(
        &self,
        ctx: &RequestContext,
        query: &str,
        source_tag: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        require_text(query, "query")?;
        self.retriever.retrieve(ctx, query, source_tag, k).await
    }

    /// Answer `query` grounded on the `top_k` documents tagged `source_tag`.
    ///
    /// An empty retrieval does not stop the pipeline: the prompt is sent with
    /// an empty context section and the system instruction decides how the
    /// model reports missing data. [`GeneratedResponse::grounded`] records
    /// which case occurred.
    ///
    /// # Errors
    ///
    /// - [`RagError::ValidationError`] for blank text
    /// - the error of whichever stage failed first
    pub async fn query(
        &self,
        ctx: &RequestContext,
        query: &str,
        source_tag: &str,
    ) -> Result<GeneratedResponse> {
        require_text(query, "query")?;

        let context = self
            .retriever
            .retrieve(ctx, query, Some(source_tag), self.config.top_k)
            .await
            .inspect_err(|e| error!(error = %e, "retrieval failed during query"))?;
        let grounded = !context.is_empty();
        if !grounded {
            info!(source_tag, "no documents matched; generating without context");
        }

        let prompt = self.prompt_builder.build(&context, query, self.config.parameters);

        let response = ctx
            .run(Stage::Generation, self.generation_provider.generate(&prompt))
            .await
            .inspect_err(|e| error!(stage = %Stage::Generation, error = %e, "query failed"))?;

        info!(
            context_count = context.len(),
            grounded,
            response_len = response.len(),
            "query completed"
        );

        Ok(GeneratedResponse { query: query.to_string(), response, context, grounded })
    }
}

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RagError::ValidationError(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Builder for constructing a [`RagPipeline`].
///
/// All fields are required. Call [`build()`](RagPipelineBuilder::build)
/// to validate and produce the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .generation_provider(Arc::new(llm))
///     .vector_store(Arc::new(store))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing or
    /// the embedding provider and vector store disagree on dimensionality.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        if embedding_provider.dimensions() != vector_store.dimensions() {
            return Err(RagError::ConfigError(format!(
                "embedding provider '{}' produces {} dimensions but the vector store expects {}",
                embedding_provider.name(),
                embedding_provider.dimensions(),
                vector_store.dimensions()
            )));
        }

        let retriever = Retriever::new(embedding_provider.clone(), vector_store.clone());
        let prompt_builder = PromptBuilder::new(config.system_instruction.clone());

        Ok(RagPipeline {
            config,
            embedding_provider,
            generation_provider,
            vector_store,
            retriever,
            prompt_builder,
        })
    }
}
