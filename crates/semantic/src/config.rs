use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;

/// Runtime configuration for the embedding adapter and the backend it wraps.
///
/// # Example
/// ```
/// use semantic::SemanticConfig;
///
/// let cfg = SemanticConfig {
///     mode: "api".into(),
///     api_url: Some("https://api.openai.com/v1/embeddings".into()),
///     api_auth_header: Some("Bearer sk-xxx".into()),
///     api_provider: Some("openai".into()),
///     target_dim: 1536,
///     ..Default::default()
/// };
/// assert_eq!(cfg.target_dim, 1536);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SemanticConfig {
    /// Backend selector: `"api"` (remote HTTP) or `"fast"` (deterministic local hash embedding).
    pub mode: String,
    /// Model identifier sent to the remote provider.
    pub model_name: String,
    /// Length of every vector handed to the vector store. Must match the index dimension.
    pub target_dim: usize,
    /// Native dimension of the `"fast"` backend.
    pub fast_dim: usize,
    /// Embedding endpoint when [`mode`](Self::mode) is `"api"`.
    pub api_url: Option<String>,
    /// Authorization header value (e.g., `"Bearer sk-xxx"`).
    pub api_auth_header: Option<String>,
    /// Remote provider hint: `"openai"`, `"hf"`, or `"custom"` (default).
    pub api_provider: Option<String>,
    /// Upper bound for one backend call.
    #[serde(with = "crate::serde_millis")]
    pub timeout: Duration,
    /// L2-normalize after dimension adaptation.
    pub normalize: bool,
    /// Fail-fast settings for the remote provider. `None` disables the breaker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            mode: "fast".into(),
            model_name: "text-embedding-ada-002".into(),
            target_dim: 1536,
            fast_dim: 384,
            api_url: None,
            api_auth_header: None,
            api_provider: None,
            timeout: Duration::from_secs(10),
            normalize: false,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

impl SemanticConfig {
    pub(crate) fn provider_name(&self) -> String {
        self.api_provider
            .as_deref()
            .unwrap_or("custom")
            .to_ascii_lowercase()
    }
}
