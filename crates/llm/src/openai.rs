use async_trait::async_trait;
use futures::{future, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::backend::{CompletionBackend, TokenStream};
use crate::lines::lines;
use crate::{LlmConfig, LlmError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions (`/chat/completions`).
pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    cfg: LlmConfig,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("url", &self.url)
            .field("model", &self.cfg.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Skip,
    Done,
}

impl OpenAiChat {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::InvalidConfig("openai provider requires an api key".into()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", cfg.base_url_or(DEFAULT_BASE_URL)),
            api_key,
            cfg: cfg.clone(),
        })
    }

    fn request<'a>(&'a self, prompt: &'a str, system_prompt: &'a str, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        ChatRequest {
            model: &self.cfg.model,
            messages,
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
            stream,
        }
    }

    async fn post(
        &self,
        body: &ChatRequest<'_>,
        timeout: std::time::Duration,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(timeout.as_millis() as u64)
                } else {
                    LlmError::Unavailable(format!("HTTP request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!("HTTP error {status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiChat {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, LlmError> {
        let body = self.request(prompt, system_prompt, false);
        let response = self.post(&body, self.cfg.timeout).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        message_content(&value)
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<TokenStream, LlmError> {
        let body = self.request(prompt, system_prompt, true);
        let response = self.post(&body, self.cfg.stream_timeout).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| e.to_string()))
            .boxed();
        Ok(sse_tokens(lines(bytes)))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn message_content(value: &Value) -> Result<String, LlmError> {
    if let Some(err) = value.get("error") {
        return Err(LlmError::Unavailable(err.to_string()));
    }
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::Decode("missing choices[0].message.content".into()))?;
    if content.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(content.to_string())
}

fn parse_sse_line(line: &str) -> Result<SseEvent, LlmError> {
    let Some(payload) = line.strip_prefix("data:") else {
        // Blank separators, comments and `event:` / `id:` fields.
        return Ok(SseEvent::Skip);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let value: Value =
        serde_json::from_str(payload).map_err(|e| LlmError::Decode(format!("bad SSE chunk: {e}")))?;
    if let Some(err) = value.get("error") {
        return Err(LlmError::Unavailable(err.to_string()));
    }
    match value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(token) if !token.is_empty() => Ok(SseEvent::Token(token.to_string())),
        _ => Ok(SseEvent::Skip),
    }
}

fn sse_tokens(lines: TokenStream) -> TokenStream {
    lines
        .map(|line| line.and_then(|l| parse_sse_line(&l)))
        .take_while(|ev| future::ready(!matches!(ev, Ok(SseEvent::Done))))
        .filter_map(|ev| {
            future::ready(match ev {
                Ok(SseEvent::Token(t)) => Some(Ok(t)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        })
        .boxed()
}
