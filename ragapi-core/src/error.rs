//! Error types for the `ragapi-core` crate.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// The pipeline stage a remote call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Text-to-vector call against the embedding model.
    Embedding,
    /// Insert or search against the vector store.
    Storage,
    /// Prompt-to-text call against the generation model.
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embedding => "embedding",
            Stage::Storage => "storage",
            Stage::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during text generation.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Storage error ({backend}): {message}")]
    StorageError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A remote call did not finish before the request deadline.
    #[error("{stage} call exceeded the request deadline of {timeout:?}")]
    Timeout {
        /// The stage that was in flight when the deadline passed.
        stage: Stage,
        /// The total budget the request was given.
        timeout: Duration,
    },

    /// The request was cancelled by its caller.
    #[error("{stage} call cancelled")]
    Cancelled {
        /// The stage that was in flight (or about to start) when cancelled.
        stage: Stage,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`RagError`], used by transports to pick a
/// response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Embedding,
    Generation,
    Storage,
    Timeout,
    Cancelled,
    Config,
}

impl RagError {
    /// Return the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::ValidationError(_) => ErrorKind::Validation,
            RagError::EmbeddingError { .. } => ErrorKind::Embedding,
            RagError::GenerationError { .. } => ErrorKind::Generation,
            RagError::StorageError { .. } => ErrorKind::Storage,
            RagError::Timeout { .. } => ErrorKind::Timeout,
            RagError::Cancelled { .. } => ErrorKind::Cancelled,
            RagError::ConfigError(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn storage(backend: &str, message: impl Into<String>) -> Self {
        RagError::StorageError { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        RagError::EmbeddingError { provider: provider.to_string(), message: message.into() }
    }

    pub(crate) fn generation(provider: &str, message: impl Into<String>) -> Self {
        RagError::GenerationError { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
