//! Generation provider trait for turning a prompt into model output.

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::prompt::Prompt;

/// A provider that produces text from a role-tagged [`Prompt`].
///
/// Implementations are stateless per call. An empty model reply is returned
/// as an empty string; it is never replaced with placeholder text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a response for `prompt`. The prompt must contain at least one message.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;
}

/// Reject prompts that have nothing to send.
#[cfg_attr(not(any(feature = "ollama", feature = "openai")), allow(dead_code))]
pub(crate) fn ensure_messages(provider: &str, prompt: &Prompt) -> Result<()> {
    if prompt.messages.is_empty() {
        return Err(RagError::generation(provider, "prompt must contain at least one message"));
    }
    Ok(())
}
