use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the completion backend.
///
/// `provider` picks the wire protocol: `"openai"` (chat completions, SSE streaming) or
/// `"ollama"` (`/api/generate`, NDJSON streaming).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// Defaults per provider when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Usually injected from `OPENAI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Bound for one non-streaming completion.
    #[serde(with = "semantic::serde_millis")]
    pub timeout: Duration,
    /// Bound for a whole streamed completion, first byte to last.
    #[serde(with = "semantic::serde_millis")]
    pub stream_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4".into(),
            base_url: None,
            api_key: None,
            temperature: 0.3,
            max_tokens: None,
            timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(300),
        }
    }
}

impl LlmConfig {
    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: "ollama".into(),
            model: model.into(),
            ..Self::default()
        }
    }

    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}
