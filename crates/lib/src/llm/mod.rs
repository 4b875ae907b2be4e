//! Chat completion backends.
//!
//! `ChatBackend` is the seam the kernel talks to; `OpenAiClient` implements it against any
//! OpenAI-compatible `/chat/completions` endpoint.

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::skills::CompletionSettings;

pub use openai::{OpenAiClient, DEFAULT_BASE_URL};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("chat request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("chat api error: {0}")]
    Api(String),
    #[error("no API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("chat response had no choices")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub message: Option<ChatMessage>,
    /// Why generation stopped ("stop", "length", ...), when the service says.
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    /// Text content of the assistant message, if any.
    pub fn content(&self) -> &str {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// A chat completion service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One non-streaming completion.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        settings: &CompletionSettings,
    ) -> Result<ChatResponse, LlmError>;

    /// Streaming completion: `on_chunk` gets each content delta; returns the accumulated message.
    /// The default runs `chat` and delivers the whole content as one chunk.
    async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        settings: &CompletionSettings,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ChatResponse, LlmError> {
        let res = self.chat(model, messages, settings).await?;
        if !res.content().is_empty() {
            on_chunk(res.content());
        }
        Ok(res)
    }
}
