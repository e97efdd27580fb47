//! Deterministic provider replaying canned responses.
//!
//! Each `stream_completion` call pops the next queued response and streams
//! it in small chunks. Used by the test suite and by `--provider scripted`
//! runs that exercise the loop without a real model.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::LlmResult;
use crate::provider::{LlmProvider, StreamBox};
use crate::types::ChatMessage;

/// Size of each streamed chunk, in characters.
const CHUNK_CHARS: usize = 16;

/// A provider that replays a fixed queue of responses.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    /// Create a provider with a queue of canned responses.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }

    /// Append another canned response to the queue.
    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response.into());
        }
    }

    /// Responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().map_or(0, |q| q.len())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "scripted"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn model(&self) -> &str {
        "scripted-v0"
    }

    async fn stream_completion(&self, _messages: &[ChatMessage]) -> LlmResult<StreamBox> {
        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_default();

        let chunks: Vec<LlmResult<String>> = response
            .chars()
            .collect::<Vec<_>>()
            .chunks(CHUNK_CHARS)
            .map(|c| Ok(c.iter().collect::<String>()))
            .collect();

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
