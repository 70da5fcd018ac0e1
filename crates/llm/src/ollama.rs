use async_trait::async_trait;
use futures::{future, StreamExt};
use serde::{Deserialize, Serialize};

use crate::backend::{CompletionBackend, TokenStream};
use crate::lines::lines;
use crate::{LlmConfig, LlmError};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local Ollama server (`/api/generate`).
#[derive(Debug)]
pub struct OllamaGenerate {
    client: reqwest::Client,
    url: String,
    cfg: LlmConfig,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaGenerate {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| LlmError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", cfg.base_url_or(DEFAULT_BASE_URL)),
            cfg: cfg.clone(),
        })
    }

    fn request<'a>(&'a self, prompt: &'a str, system: &'a str, stream: bool) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.cfg.model,
            prompt,
            system,
            stream,
            options: GenerateOptions {
                temperature: self.cfg.temperature,
                num_predict: self.cfg.max_tokens,
            },
        }
    }

    async fn post(
        &self,
        body: &GenerateRequest<'_>,
        timeout: std::time::Duration,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(timeout.as_millis() as u64)
                } else {
                    LlmError::Unavailable(format!("Ollama HTTP error: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!("Ollama returned {status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for OllamaGenerate {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, LlmError> {
        let body = self.request(prompt, system_prompt, false);
        let response = self.post(&body, self.cfg.timeout).await?;
        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        if let Some(err) = chunk.error {
            return Err(LlmError::Unavailable(err));
        }
        if chunk.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(chunk.response)
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
        Ok(ndjson_tokens(lines(bytes)))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// One parsed NDJSON line: an optional token and whether generation finished.
fn parse_ndjson_line(line: &str) -> Result<(Option<String>, bool), LlmError> {
    if line.trim().is_empty() {
        return Ok((None, false));
    }
    let chunk: GenerateChunk = serde_json::from_str(line)
        .map_err(|e| LlmError::Decode(format!("bad NDJSON chunk: {e}")))?;
    if let Some(err) = chunk.error {
        return Err(LlmError::Unavailable(err));
    }
    let token = (!chunk.response.is_empty()).then_some(chunk.response);
    Ok((token, chunk.done))
}

fn ndjson_tokens(lines: TokenStream) -> TokenStream {
    // `scan` stops after the line that carries `done: true`.
    lines
        .scan(false, |finished, line| {
            if *finished {
                return future::ready(None);
            }
            let item = match line.and_then(|l| parse_ndjson_line(&l)) {
                Ok((token, done)) => {
                    *finished = done;
                    token.map(Ok)
                }
                Err(e) => {
                    *finished = true;
                    Some(Err(e))
                }
            };
            future::ready(Some(item))
        })
        .filter_map(future::ready)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    #[test]
    fn request_body_shape() {
        let b = OllamaGenerate::from_config(&LlmConfig::ollama("mistral")).unwrap();
        let body = serde_json::to_value(b.request("hi", "", false)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "mistral",
                "prompt": "hi",
                "stream": false,
                "options": {"temperature": 0.3f32}
            })
        );
        assert_eq!(b.url, "http://localhost:11434/api/generate");
    }

    #[test]
    fn parses_ndjson_lines() {
        assert_eq!(
            parse_ndjson_line(r#"{"model":"mistral","response":"The","done":false}"#).unwrap(),
            (Some("The".to_string()), false)
        );
        assert_eq!(
            parse_ndjson_line(r#"{"response":"","done":true,"eval_count":12}"#).unwrap(),
            (None, true)
        );
        assert!(matches!(
            parse_ndjson_line(r#"{"error":"model not found"}"#),
            Err(LlmError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn ndjson_stream_stops_after_done() {
        let raw = [
            r#"{"response":"The","done":false}"#,
            r#"{"response":" mayor","done":false}"#,
            r#"{"response":"","done":true}"#,
            r#"{"response":"late","done":false}"#,
        ];
        let input: TokenStream = stream::iter(raw.into_iter().map(|l| Ok(l.to_string()))).boxed();
        let tokens: Vec<_> = ndjson_tokens(input).collect().await;
        assert_eq!(tokens, vec![Ok("The".to_string()), Ok(" mayor".to_string())]);
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let b = OllamaGenerate::from_config(&LlmConfig {
            base_url: Some("http://127.0.0.1:9".into()),
            ..LlmConfig::ollama("mistral")
        })
        .unwrap();
        let err = b.stream_complete("hi", "").await.err().unwrap();
        assert!(matches!(err, LlmError::Unavailable(_) | LlmError::Timeout(_)));
    }
}
