//! Ollama embedding and generation providers.
//!
//! Talks to Ollama's native REST API (`/api/embed` and `/api/chat`) using
//! `reqwest`. This module is only available when the `ollama` feature is
//! enabled (it is on by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationProvider, ensure_messages};
use crate::http::{build_client, describe_send_error, join_url};
use crate::prompt::Prompt;

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use ragapi_core::{EmbeddingConfig, ollama::OllamaEmbeddingProvider};
///
/// let provider = OllamaEmbeddingProvider::new(&EmbeddingConfig::default())?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a configured header is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout, &config.headers)?,
            url: join_url(&config.endpoint, "api/embed"),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

/// A [`GenerationProvider`] backed by Ollama's non-streaming `/api/chat` endpoint.
pub struct OllamaGenerationProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaGenerationProvider {
    /// Create a provider from its configuration.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout, &config.headers)?,
            url: join_url(&config.endpoint, "api/chat"),
            model: config.model.clone(),
        })
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Turn a non-success response into a readable message.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// ── Provider implementations ───────────────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, input: text })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                RagError::embedding(PROVIDER, describe_send_error(&e))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "embedding API error");
            return Err(RagError::embedding(PROVIDER, message));
        }

        let body: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embedding response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        match body.embeddings.into_iter().next() {
            Some(embedding) if !embedding.is_empty() => Ok(embedding),
            _ => Err(RagError::embedding(PROVIDER, "API returned no embedding")),
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerationProvider {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        ensure_messages(PROVIDER, prompt)?;
        debug!(
            provider = PROVIDER,
            model = %self.model,
            messages = prompt.messages.len(),
            "generating response"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: prompt
                .messages
                .iter()
                .map(|m| ChatMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            stream: false,
            options: ChatOptions {
                num_predict: prompt.parameters.max_tokens,
                temperature: prompt.parameters.temperature,
                top_p: prompt.parameters.top_p,
            },
        };

        let response = self.client.post(&self.url).json(&request).send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "chat request failed");
            RagError::generation(PROVIDER, describe_send_error(&e))
        })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "chat API error");
            return Err(RagError::generation(PROVIDER, message));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse chat response");
            RagError::generation(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        let content = body
            .message
            .map(|m| m.content)
            .ok_or_else(|| RagError::generation(PROVIDER, "response has no message"))?;
        if content.is_empty() {
            warn!(provider = PROVIDER, model = %self.model, "model returned empty content");
        }
        Ok(content)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
