//! Text-completion backends.
//!
//! [`CompletionBackend`] is the seam between answer synthesis and the language model. It has a
//! one-shot [`complete`](CompletionBackend::complete) and a
//! [`stream_complete`](CompletionBackend::stream_complete) that yields tokens as a
//! [`TokenStream`]; dropping that stream abandons the generation.
//!
//! Two HTTP implementations are provided: [`OpenAiChat`] (server-sent events) and
//! [`OllamaGenerate`] (newline-delimited JSON). Pick one with [`from_config`].

mod backend;
mod config;
mod error;
mod lines;
mod ollama;
mod openai;

pub use backend::{CompletionBackend, TokenStream};
pub use config::LlmConfig;
pub use error::LlmError;
pub use ollama::OllamaGenerate;
pub use openai::OpenAiChat;

use std::sync::Arc;

/// Build the backend named by `cfg.provider`.
pub fn from_config(cfg: &LlmConfig) -> Result<Arc<dyn CompletionBackend>, LlmError> {
    match cfg.provider.to_ascii_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::from_config(cfg)?)),
        "ollama" => Ok(Arc::new(OllamaGenerate::from_config(cfg)?)),
        other => Err(LlmError::InvalidConfig(format!(
            "unknown llm provider '{other}' (expected 'openai' or 'ollama')"
        ))),
    }
}
