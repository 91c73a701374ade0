//! Construct concrete providers and stores from configuration values.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{EmbeddingConfig, GenerationConfig, ProviderKind, StoreConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::inmemory::InMemoryVectorStore;
use crate::vectorstore::VectorStore;

/// Build the embedding provider named by `config.provider`.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if the provider's feature is not compiled
/// in or its configuration is invalid.
pub fn embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    if config.dimensions == 0 {
        return Err(RagError::ConfigError("embedding dimensions must be greater than zero".into()));
    }
    info!(provider = %config.provider, model = %config.model, endpoint = %config.endpoint, "embedding provider");
    match config.provider {
        #[cfg(feature = "ollama")]
        ProviderKind::Ollama => Ok(Arc::new(crate::ollama::OllamaEmbeddingProvider::new(config)?)),
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => Ok(Arc::new(crate::openai::OpenAiEmbeddingProvider::new(config)?)),
        #[allow(unreachable_patterns)]
        other => Err(feature_missing(other)),
    }
}

/// Build the generation provider named by `config.provider`.
pub fn generation_provider(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    info!(provider = %config.provider, model = %config.model, endpoint = %config.endpoint, "generation provider");
    match config.provider {
        #[cfg(feature = "ollama")]
        ProviderKind::Ollama => {
            Ok(Arc::new(crate::ollama::OllamaGenerationProvider::new(config)?))
        }
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => {
            Ok(Arc::new(crate::openai::OpenAiGenerationProvider::new(config)?))
        }
        #[allow(unreachable_patterns)]
        other => Err(feature_missing(other)),
    }
}

/// Open the vector store described by `config` for `dimensions`-long vectors.
///
/// Without a `database_url` this returns an [`InMemoryVectorStore`].
pub async fn vector_store(config: &StoreConfig, dimensions: usize) -> Result<Arc<dyn VectorStore>> {
    match config.database_url {
        None => {
            warn!("no database url configured; documents are kept in memory only");
            Ok(Arc::new(InMemoryVectorStore::with_metric(dimensions, config.metric)))
        }
        #[cfg(feature = "pgvector")]
        Some(_) => Ok(Arc::new(crate::pgvector::PgVectorStore::connect(config, dimensions).await?)),
        #[cfg(not(feature = "pgvector"))]
        Some(_) => Err(RagError::ConfigError(
            "a database url was configured but the `pgvector` feature is disabled".to_string(),
        )),
    }
}

#[allow(dead_code)]
fn feature_missing(kind: ProviderKind) -> RagError {
    RagError::ConfigError(format!("provider '{kind}' is not enabled in this build"))
}
