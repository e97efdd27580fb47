//! LLM provider trait.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::LlmResult;
use crate::types::ChatMessage;

/// Type alias for boxed token streams.
pub type StreamBox = Pin<Box<dyn Stream<Item = LlmResult<String>> + Send>>;

/// LLM provider trait.
///
/// Implementors stream plain text deltas for a conversation. The server
/// treats the stream as opaque tokens and forwards them to the client as
/// `ai_response_chunk` frames while accumulating the assistant turn.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name.
    fn name(&self) -> &str;

    /// Model identifier in use.
    fn model(&self) -> &str;

    /// Stream a completion for the given messages.
    async fn stream_completion(&self, messages: &[ChatMessage]) -> LlmResult<StreamBox>;

    /// Count tokens in text (approximate).
    fn count_tokens(&self, text: &str) -> usize {
        // Rough approximation: ~4 chars per token
        text.len() / 4
    }
}

/// Blanket implementation so `Box<dyn LlmProvider>` can be used wherever
/// `P: LlmProvider` is required.
#[async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> LlmResult<StreamBox> {
        (**self).stream_completion(messages).await
    }

    fn count_tokens(&self, text: &str) -> usize {
        (**self).count_tokens(text)
    }
}
