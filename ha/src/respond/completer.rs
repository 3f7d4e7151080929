//! Prompt rendering plus a single completion call

use std::sync::Arc;

use eyre::{Result, eyre};
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, Message, StopReason};
use crate::prompts::{PromptContext, PromptLoader};

/// Renders a named prompt and sends it to the completion service
pub struct Completer {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    max_tokens: u32,
}

impl Completer {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
        }
    }

    /// Render `template` with `context` and return the reply verbatim
    ///
    /// A blank reply counts as a failure.
    pub async fn complete(&self, template: &str, context: &PromptContext, stop: &[&str]) -> Result<String> {
        debug!(%template, stop_count = stop.len(), "complete: called");
        let request = CompletionRequest {
            system_prompt: self.prompts.system_prompt()?,
            messages: vec![Message::user(self.prompts.render(template, context)?)],
            max_tokens: self.max_tokens,
            temperature: None,
            stop: stop.iter().map(|s| s.to_string()).collect(),
        };

        let response = self.llm.complete(request).await?;
        if response.stop_reason == StopReason::MaxTokens {
            warn!(%template, max_tokens = self.max_tokens, "complete: reply truncated at max tokens");
        }
        let Some(text) = response.content.filter(|c| !c.trim().is_empty()) else {
            return Err(eyre!("completion for '{}' returned no text", template));
        };
        debug!(%template, reply_len = text.len(), usage = response.usage.total(), "complete: done");
        Ok(text)
    }
}
