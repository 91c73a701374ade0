//! # ragapi-core
//!
//! Retrieval-augmented generation pipeline.
//!
//! ## Overview
//!
//! Documents are embedded and stored in a [`VectorStore`]. A query is embedded
//! the same way, the most similar documents are retrieved, appended to the
//! query as context, and the resulting [`Prompt`] is sent to a
//! [`GenerationProvider`].
//!
//! - [`EmbeddingProvider`] / [`GenerationProvider`] - remote model adapters
//!   ([`ollama`], [`openai`])
//! - [`VectorStore`] - [`InMemoryVectorStore`] and [`pgvector::PgVectorStore`]
//! - [`Retriever`] - embed + search
//! - [`PromptBuilder`] - system instruction + augmented query
//! - [`RagPipeline`] - the ingest and query flows
//! - [`RequestContext`] - per-request deadline and cancellation
//!
//! ## Features
//!
//! | Feature    | Default | Enables                              |
//! |------------|---------|--------------------------------------|
//! | `ollama`   | yes     | [`ollama`] providers                 |
//! | `openai`   | no      | [`openai`] providers                 |
//! | `pgvector` | yes     | [`pgvector::PgVectorStore`]          |

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod vectorstore;

#[cfg(any(feature = "ollama", feature = "openai"))]
mod http;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;

pub use config::{
    DEFAULT_SOURCE_TAG, DEFAULT_SYSTEM_INSTRUCTION, EmbeddingConfig, GenerationConfig,
    NO_DATA_REPLY, ProviderKind, RagConfig, RagConfigBuilder, StoreConfig,
};
pub use context::RequestContext;
pub use document::{Document, DocumentId, ScoredDocument};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorKind, RagError, Result, Stage};
pub use generation::GenerationProvider;
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{GeneratedResponse, RagPipeline, RagPipelineBuilder};
pub use prompt::{GenerationParameters, Message, Prompt, PromptBuilder, Role, augment_query};
pub use retriever::Retriever;
pub use vectorstore::{SimilarityMetric, VectorStore};
