//! OpenAI-compatible embedding and generation providers.
//!
//! Calls `/embeddings` and `/chat/completions` on any OpenAI-compatible base
//! URL (OpenAI itself, vLLM, LiteLLM, Ollama's `/v1` shim, ...).
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationProvider, ensure_messages};
use crate::http::{build_client, describe_send_error, join_url};
use crate::prompt::Prompt;

const PROVIDER: &str = "OpenAI";

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `endpoint` – API base, e.g. [`OPENAI_API_BASE`].
/// - `model` – e.g. `text-embedding-3-small`.
/// - `dimensions` – expected vector length; sent as the `dimensions`
///   request field only when `send_dimensions` is set.
/// - `api_key` – bearer token; from the config or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use ragapi_core::openai::OpenAiEmbeddingProvider;
///
/// let provider = OpenAiEmbeddingProvider::new(&config)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    send_dimensions: bool,
}

impl OpenAiEmbeddingProvider {
    /// Create a provider from its configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout, &config.headers)?,
            url: join_url(&config.endpoint, "embeddings"),
            api_key: resolve_api_key(config.api_key.as_deref()),
            model: config.model.clone(),
            dimensions: config.dimensions,
            send_dimensions: config.send_dimensions,
        })
    }
}

/// A [`GenerationProvider`] backed by an OpenAI-compatible chat completions API.
pub struct OpenAiGenerationProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiGenerationProvider {
    /// Create a provider from its configuration.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout, &config.headers)?,
            url: join_url(&config.endpoint, "chat/completions"),
            api_key: resolve_api_key(config.api_key.as_deref()),
            model: config.model.clone(),
        })
    }
}

fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|key| !key.is_empty())
}

fn authorize(request: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// ── Provider implementations ───────────────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
            dimensions: self.send_dimensions.then_some(self.dimensions),
        };

        let response = authorize(self.client.post(&self.url), self.api_key.as_deref())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::embedding(PROVIDER, describe_send_error(&e))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "API error");
            return Err(RagError::embedding(PROVIDER, message));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        match embedding_response.data.into_iter().next() {
            Some(data) if !data.embedding.is_empty() => Ok(data.embedding),
            _ => Err(RagError::embedding(PROVIDER, "API returned empty response")),
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
impl GenerationProvider for OpenAiGenerationProvider {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        ensure_messages(PROVIDER, prompt)?;
        debug!(
            provider = PROVIDER,
            model = %self.model,
            messages = prompt.messages.len(),
            "generating response"
        );

        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages: prompt
                .messages
                .iter()
                .map(|m| ChatMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            max_tokens: prompt.parameters.max_tokens,
            temperature: prompt.parameters.temperature,
            top_p: prompt.parameters.top_p,
        };

        let response = authorize(self.client.post(&self.url), self.api_key.as_deref())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::generation(PROVIDER, describe_send_error(&e))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "API error");
            return Err(RagError::generation(PROVIDER, message));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::generation(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::generation(PROVIDER, "API returned no choices"))?;
        let content = choice.message.content.unwrap_or_default();
        if content.is_empty() {
            warn!(provider = PROVIDER, model = %self.model, "model returned empty content");
        }
        Ok(content)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
