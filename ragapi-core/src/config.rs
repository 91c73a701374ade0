//! Configuration for the RAG pipeline and the components it is built from.
//!
//! All configuration is plain immutable data. A process builds these values
//! once at startup and hands them to constructors; nothing here is global.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::prompt::GenerationParameters;
use crate::vectorstore::SimilarityMetric;

/// Reply the default system instruction asks the model to give when the
/// context does not answer the question.
pub const NO_DATA_REPLY: &str = "No data found.";

/// Default system instruction for the query pipeline.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an AI assistant. Use the provided context to \
answer the user's question as accurately as possible. Do not answer questions that the context \
does not cover. If the context does not contain the answer, reply exactly with 'No data found.'";

/// Default tag for ingested documents and for searches without an explicit tag.
pub const DEFAULT_SOURCE_TAG: &str = "ollama";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Number of documents retrieved per query.
    pub top_k: usize,
    /// Tag written on ingested documents unless the caller supplies one.
    pub source_tag: String,
    /// Text of the `system` message in every generated prompt.
    pub system_instruction: String,
    /// Sampling parameters for the generation call.
    pub parameters: GenerationParameters,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            parameters: GenerationParameters::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of documents retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the default source tag.
    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.source_tag = tag.into();
        self
    }

    /// Set the system instruction.
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = instruction.into();
        self
    }

    /// Set the generation parameters.
    pub fn parameters(mut self, parameters: GenerationParameters) -> Self {
        self.config.parameters = parameters;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `source_tag` or `system_instruction` is blank
    /// - the generation parameters are out of range
    pub fn build(self) -> Result<RagConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.source_tag.trim().is_empty() {
            return Err(RagError::ConfigError("source_tag must not be empty".to_string()));
        }
        if self.config.system_instruction.trim().is_empty() {
            return Err(RagError::ConfigError("system_instruction must not be empty".to_string()));
        }
        self.config
            .parameters
            .validate()
            .map_err(|e| RagError::ConfigError(format!("invalid generation parameters: {e}")))?;
        Ok(self.config)
    }
}

/// Which remote API family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Ollama's native `/api/embed` and `/api/chat` endpoints.
    #[default]
    Ollama,
    /// Any OpenAI-compatible `/embeddings` and `/chat/completions` API.
    OpenAi,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Ollama => f.write_str("ollama"),
            ProviderKind::OpenAi => f.write_str("openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" | "open_ai" => Ok(ProviderKind::OpenAi),
            other => Err(RagError::ConfigError(format!("unknown provider '{other}'"))),
        }
    }
}

/// Connection settings for an embedding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    /// Base URL, e.g. `http://localhost:11434` or `https://api.openai.com/v1`.
    pub endpoint: String,
    pub model: String,
    /// Dimension `D` of the vectors the model returns.
    pub dimensions: usize,
    /// Ask the model for `dimensions`-long vectors. Only OpenAI-compatible
    /// providers use this, and only models with shortenable embeddings accept it.
    #[serde(default)]
    pub send_dimensions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Upper bound for a single HTTP call.
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            model: "mxbai-embed-large".to_string(),
            dimensions: 1024,
            send_dimensions: false,
            api_key: None,
            headers: Vec::new(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Connection settings for a generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            api_key: None,
            headers: Vec::new(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// PostgreSQL connection string. `None` selects the in-memory store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Table holding the documents.
    pub table: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long an operation may wait for a pooled connection.
    pub acquire_timeout: Duration,
    pub metric: SimilarityMetric,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            table: "documents".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            metric: SimilarityMetric::Cosine,
        }
    }
}
