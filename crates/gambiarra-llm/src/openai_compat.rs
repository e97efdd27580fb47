//! OpenAI-compatible streaming provider.
//!
//! Works with the `OpenAI` API, LM Studio, vLLM, Ollama, and any other
//! endpoint that speaks `/v1/chat/completions` with SSE streaming.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::provider::{LlmProvider, StreamBox};
use crate::types::ChatMessage;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    client: Client,
    model: String,
    base_url: String,
    api_key: Option<String>,
    max_tokens: usize,
    temperature: f64,
}

impl OpenAiCompatProvider {
    /// Create a provider for the `OpenAI` API.
    #[must_use]
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            model: model.to_string(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: Some(api_key.to_string()),
            max_tokens: 4096,
            temperature: 0.1,
        }
    }

    /// Create a provider for a custom endpoint.
    #[must_use]
    pub fn custom(base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: Client::new(),
            model: model.to_string(),
            base_url: base_url.to_string(),
            api_key: api_key.map(ToString::to_string),
            max_tokens: 4096,
            temperature: 0.1,
        }
    }

    /// Set max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    fn build_request(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": true,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> LlmResult<StreamBox> {
        let body = self.build_request(messages);
        let mut request = self.client.post(&self.base_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiRequestFailed(format!("{status}: {text}")));
        }

        debug!(model = %self.model, "provider stream opened");
        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(LlmError::HttpError)?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE events are newline-delimited `data: {json}` lines
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        return;
                    }
                    match serde_json::from_str::<Value>(data) {
                        Ok(event) => {
                            if let Some(delta) = event["choices"][0]["delta"]["content"].as_str()
                                && !delta.is_empty()
                            {
                                yield delta.to_string();
                            }
                        },
                        Err(e) => {
                            warn!(error = %e, "skipping unparseable SSE event");
                        },
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
