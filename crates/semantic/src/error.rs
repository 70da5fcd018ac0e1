use thiserror::Error;

/// Errors surfaced by embedding backends and the [`EmbeddingAdapter`](crate::EmbeddingAdapter).
///
/// The adapter's infallible [`embed`](crate::EmbeddingAdapter::embed) swallows all of these and
/// returns a zero vector; [`try_embed`](crate::EmbeddingAdapter::try_embed) hands them back.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SemanticError {
    /// Text was empty or whitespace-only; no backend call was made.
    #[error("cannot embed empty text")]
    EmptyText,
    /// Configuration is inconsistent (e.g. `api` mode without `api_url`).
    #[error("invalid semantic config: {0}")]
    InvalidConfig(String),
    /// The remote embedding service could not be reached or answered with a non-2xx status.
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    /// The circuit breaker for this provider is open.
    #[error("circuit open for provider '{0}'")]
    CircuitOpen(String),
    /// The backend call exceeded its timeout.
    #[error("embedding timed out after {0} ms")]
    Timeout(u64),
    /// The backend answered, but the payload could not be turned into a vector.
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

impl SemanticError {
    /// Whether the failure says something about backend health (as opposed to caller input).
    pub fn is_backend_failure(&self) -> bool {
        !matches!(self, SemanticError::EmptyText | SemanticError::InvalidConfig(_))
    }
}
