//! Query embeddings for retrieval
//!
//! This crate turns query text into fixed-length vectors that can be sent to a vector
//! store. Whatever the backend's native dimension, every vector that leaves the
//! [`EmbeddingAdapter`] has exactly `target_dim` components: shorter outputs are zero-padded
//! and longer ones are truncated.
//!
//! Two backends ship with the crate:
//!
//! - **API mode** - Call out to an OpenAI, Hugging Face, or custom JSON embedding endpoint.
//! - **Fast mode** - Deterministic hash vectors. No network, no model files. Good for tests
//!   and for running the pipeline offline.
//!
//! The adapter never fails outward through [`EmbeddingAdapter::embed`]. Errors are logged and
//! turned into a zero vector, which callers can detect with [`EmbeddingVector::is_zero`].
//! Use [`EmbeddingAdapter::try_embed`] when you need the error itself.
//!
//! ## Quick example
//!
//! ```
//! use semantic::{EmbeddingAdapter, SemanticConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let adapter = EmbeddingAdapter::from_config(&SemanticConfig {
//!     mode: "fast".into(),
//!     target_dim: 1024,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let v = adapter.embed("When is trash collected?").await;
//! assert_eq!(v.len(), 1024);
//! # }
//! ```

pub mod backend;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod normalize;
pub mod serde_millis;
pub mod types;

mod api;
mod stub;

pub use crate::api::ApiEmbedder;
pub use crate::backend::EmbeddingBackend;
pub use crate::circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use crate::config::SemanticConfig;
pub use crate::error::SemanticError;
pub use crate::normalize::adapt_dimension;
pub use crate::stub::HashEmbedder;
pub use crate::types::EmbeddingVector;

use std::sync::Arc;
use std::time::Duration;

use crate::normalize::l2_normalize_in_place;

/// Wraps one embedding backend and fits its output to a fixed dimension.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct EmbeddingAdapter {
    backend: Arc<dyn EmbeddingBackend>,
    target_dim: usize,
    normalize: bool,
    timeout: Duration,
}

impl std::fmt::Debug for EmbeddingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingAdapter")
            .field("backend", &self.backend.name())
            .field("target_dim", &self.target_dim)
            .field("normalize", &self.normalize)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EmbeddingAdapter {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, target_dim: usize) -> Self {
        Self {
            backend,
            target_dim,
            normalize: false,
            timeout: Duration::from_secs(10),
        }
    }

    /// Build the backend named by `cfg.mode`.
    ///
    /// Unknown modes are a configuration error rather than a silent fallback, since a wrong
    /// backend would produce vectors in a different space than the index.
    pub fn from_config(cfg: &SemanticConfig) -> Result<Self, SemanticError> {
        if cfg.target_dim == 0 {
            return Err(SemanticError::InvalidConfig(
                "target_dim must be greater than zero".into(),
            ));
        }
        let backend: Arc<dyn EmbeddingBackend> = match cfg.mode.as_str() {
            "api" => Arc::new(ApiEmbedder::from_config(cfg)?),
            "fast" => Arc::new(HashEmbedder::new(cfg.fast_dim)),
            other => {
                return Err(SemanticError::InvalidConfig(format!(
                    "unknown embedding mode '{other}' (expected 'api' or 'fast')"
                )))
            }
        };

        Ok(Self::new(backend, cfg.target_dim)
            .with_normalize(cfg.normalize)
            .with_timeout(cfg.timeout))
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Embed `text` at the configured dimension, returning the error on failure.
    pub async fn try_embed(&self, text: &str) -> Result<EmbeddingVector, SemanticError> {
        self.try_embed_with_dim(text, self.target_dim).await
    }

    pub async fn try_embed_with_dim(
        &self,
        text: &str,
        target_dim: usize,
    ) -> Result<EmbeddingVector, SemanticError> {
        if text.trim().is_empty() {
            return Err(SemanticError::EmptyText);
        }

        let raw = tokio::time::timeout(self.timeout, self.backend.encode(text))
            .await
            .map_err(|_| SemanticError::Timeout(self.timeout.as_millis() as u64))??;

        let native_dim = raw.len();
        let mut vector = adapt_dimension(raw, target_dim);
        if self.normalize {
            l2_normalize_in_place(&mut vector);
        }
        if native_dim != target_dim {
            tracing::trace!(native_dim, target_dim, "adapted embedding dimension");
        }
        Ok(EmbeddingVector::from_adapted(vector))
    }

    /// Embed `text` at the configured dimension. Never fails: errors yield a zero vector.
    pub async fn embed(&self, text: &str) -> EmbeddingVector {
        self.embed_with_dim(text, self.target_dim).await
    }

    /// Embed `text` at an explicit dimension. Never fails: errors yield a zero vector.
    pub async fn embed_with_dim(&self, text: &str, target_dim: usize) -> EmbeddingVector {
        match self.try_embed_with_dim(text, target_dim).await {
            Ok(v) => v,
            Err(SemanticError::EmptyText) => EmbeddingVector::zeros(target_dim),
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "embedding failed, returning zero vector"
                );
                EmbeddingVector::zeros(target_dim)
            }
        }
    }
}
