//! Prompt types and the builder that turns retrieved context into a prompt.
//!
//! A [`Prompt`] is an ordered list of role-tagged [`Message`]s plus the
//! [`GenerationParameters`] for the model call. [`PromptBuilder`] assembles
//! the fixed two-message shape used by the query pipeline:
//!
//! 1. a `system` message carrying the configured instruction, then
//! 2. a `user` message carrying the query augmented with retrieved context.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::document::ScoredDocument;
use crate::error::{RagError, Result};

/// Header placed between the user query and the rendered documents.
pub const CONTEXT_HEADER: &str = "Context:";

/// The author of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// The wire name of the role, as used by chat-completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Sampling parameters for a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Upper bound on generated tokens. Always positive.
    pub max_tokens: u32,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f32,
    /// Nucleus sampling mass in `[0, 1]`.
    pub top_p: f32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self { max_tokens: 150, temperature: 0.7, top_p: 0.9 }
    }
}

impl GenerationParameters {
    /// Create validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] if:
    /// - `max_tokens == 0`
    /// - `temperature` is outside `[0, 2]`
    /// - `top_p` is outside `[0, 1]`
    pub fn new(max_tokens: u32, temperature: f32, top_p: f32) -> Result<Self> {
        let params = Self { max_tokens, temperature, top_p };
        params.validate()?;
        Ok(params)
    }

    /// Check the invariants documented on [`GenerationParameters::new`].
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(RagError::ValidationError("max_tokens must be greater than zero".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::ValidationError(format!(
                "temperature ({}) must be within [0, 2]",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(RagError::ValidationError(format!(
                "top_p ({}) must be within [0, 1]",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// An ordered message sequence plus generation parameters.
///
/// # Example
///
/// ```rust
/// use ragapi_core::{GenerationParameters, Prompt, Role};
///
/// let prompt = Prompt::new()
///     .add_message(Role::System, "You are terse.")
///     .add_message(Role::User, "Hi")
///     .with_parameters(GenerationParameters::default());
/// assert_eq!(prompt.messages.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Prompt {
    pub messages: Vec<Message>,
    pub parameters: GenerationParameters,
}

impl Prompt {
    /// Create an empty prompt with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Order of calls is the order sent to the model.
    pub fn add_message(mut self, role: Role, content: impl Into<String>) -> Self {
        self.messages.push(Message::new(role, content));
        self
    }

    /// Replace the generation parameters.
    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Content of the first message with the given role, if any.
    pub fn first_content(&self, role: Role) -> Option<&str> {
        self.messages.iter().find(|m| m.role == role).map(|m| m.content.as_str())
    }
}

/// Render `user_query` followed by the retrieved documents, in rank order.
///
/// The format is stable so that identical inputs always produce identical
/// bytes:
///
/// ```text
/// {user_query}
///
/// Context:
/// [1] {first document}
/// [2] {second document}
/// ```
///
/// With no documents the header is still emitted and followed by nothing.
pub fn augment_query(user_query: &str, retrieved: &[ScoredDocument]) -> String {
    let mut out = String::with_capacity(
        user_query.len()
            + CONTEXT_HEADER.len()
            + retrieved.iter().map(|d| d.document.content.len() + 8).sum::<usize>()
            + 4,
    );
    out.push_str(user_query);
    out.push_str("\n\n");
    out.push_str(CONTEXT_HEADER);
    for (rank, scored) in retrieved.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(out, "\n[{}] {}", rank + 1, scored.document.content);
    }
    out
}

/// Builds the system + augmented-user prompt for the query pipeline.
///
/// Holds only the fixed system instruction; every call to
/// [`build`](PromptBuilder::build) is a pure function of its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    system_instruction: String,
}

impl PromptBuilder {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self { system_instruction: system_instruction.into() }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Assemble the prompt: one `system` message, one `user` message.
    pub fn build(
        &self,
        retrieved: &[ScoredDocument],
        user_query: &str,
        parameters: GenerationParameters,
    ) -> Prompt {
        Prompt::new()
            .add_message(Role::System, self.system_instruction.as_str())
            .add_message(Role::User, augment_query(user_query, retrieved))
            .with_parameters(parameters)
    }
}
