//! OpenAI-compatible chat completions client (https://api.openai.com/v1 by default).
//! Non-streaming and streaming (server-sent events) requests, bearer auth.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ChatBackend, ChatMessage, ChatResponse, LlmError};
use crate::skills::CompletionSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// `base_url` defaults to the public OpenAI endpoint; a trailing `/` is dropped.
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, body: &OpenAiChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        log::debug!("POST {} (model {}, stream {})", url, body.model, body.stream);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        Ok(res)
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    /// POST /chat/completions, non-streaming.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        settings: &CompletionSettings,
    ) -> Result<ChatResponse, LlmError> {
        let body = OpenAiChatRequest::new(model, &messages, settings, false);
        let data: OpenAiChatResponse = self.post(&body).await?.json().await?;
        openai_response_to_chat_response(data)
    }

    /// POST /chat/completions with stream: true. Parses `data:` lines until `[DONE]`.
    async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        settings: &CompletionSettings,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ChatResponse, LlmError> {
        let body = OpenAiChatRequest::new(model, &messages, settings, true);
        let res = self.post(&body).await?;
        let mut stream = res.bytes_stream();
        let mut acc = StreamAccumulator::default();
        while let Some(chunk) = stream.next().await {
            if acc.feed(&chunk?, on_chunk) {
                break;
            }
        }
        Ok(acc.finish(on_chunk))
    }
}

/// Splits an SSE body into lines and collects content deltas.
#[derive(Default)]
struct StreamAccumulator {
    buffer: Vec<u8>,
    content: String,
    finish_reason: Option<String>,
    done: bool,
}

impl StreamAccumulator {
    /// Consume `bytes`, handling every complete line. Returns true once `[DONE]` is seen.
    fn feed(&mut self, bytes: &[u8], on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send)) -> bool {
        self.buffer.extend_from_slice(bytes);
        while !self.done {
            let Some(i) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line_bytes: Vec<u8> = self.buffer.drain(..=i).collect();
            self.handle_line(&String::from_utf8_lossy(&line_bytes), on_chunk);
        }
        self.done
    }

    /// End of body: a last line without a trailing newline still counts.
    fn finish(mut self, on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send)) -> ChatResponse {
        if !self.done && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.handle_line(&String::from_utf8_lossy(&rest), on_chunk);
        }
        ChatResponse {
            message: Some(ChatMessage::assistant(self.content)),
            finish_reason: self.finish_reason,
        }
    }

    fn handle_line(&mut self, line: &str, on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send)) {
        match parse_sse_line(line) {
            SseLine::Done => self.done = true,
            SseLine::Chunk(ev) => {
                let Some(choice) = ev.choices.and_then(|c| c.into_iter().next()) else {
                    return;
                };
                if let Some(c) = choice.delta.and_then(|d| d.content) {
                    if !c.is_empty() {
                        on_chunk(&c);
                        self.content.push_str(&c);
                    }
                }
                if choice.finish_reason.is_some() {
                    self.finish_reason = choice.finish_reason;
                }
            }
            SseLine::Other => {}
        }
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

impl<'a> OpenAiChatRequest<'a> {
    fn new(
        model: &'a str,
        messages: &'a [ChatMessage],
        settings: &'a CompletionSettings,
        stream: bool,
    ) -> Self {
        Self {
            model,
            messages,
            stream,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            presence_penalty: settings.presence_penalty,
            frequency_penalty: settings.frequency_penalty,
            stop: Some(settings.stop_sequences.as_slice()).filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Option<Vec<OpenAiChoice>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    role: Option<String>,
    content: Option<String>,
}

fn openai_response_to_chat_response(data: OpenAiChatResponse) -> Result<ChatResponse, LlmError> {
    let choice = data
        .choices
        .and_then(|c| c.into_iter().next())
        .ok_or(LlmError::EmptyResponse)?;
    let message = choice.message.map(|m| ChatMessage {
        role: m.role.unwrap_or_else(|| "assistant".to_string()),
        content: m.content.unwrap_or_default(),
    });
    Ok(ChatResponse {
        message,
        finish_reason: choice.finish_reason,
    })
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Option<Vec<OpenAiStreamChoice>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiStreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

enum SseLine {
    Chunk(OpenAiStreamChunk),
    Done,
    /// Blank lines, comments, other fields, and data that is not a chunk.
    Other,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Other;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(c) => SseLine::Chunk(c),
        Err(e) => {
            log::debug!("skipping unparseable stream event: {}", e);
            SseLine::Other
        }
    }
}
