use index::IndexError;
use llm::LlmError;
use semantic::SemanticError;
use thiserror::Error;

/// Failure kinds of the answering pipeline.
///
/// Only [`InvalidQuery`](AssistantError::InvalidQuery) and
/// [`InvalidConfig`](AssistantError::InvalidConfig) ever reach callers. The other variants move
/// between tiers inside the resolver and end up as a degraded answer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssistantError {
    /// Empty or whitespace-only query text.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The embedding service, vector store or completion service could not be used.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The store answered but nothing cleared the score threshold.
    #[error("no documents cleared the score threshold")]
    NoResultsFound,
    /// The completion call failed after retrieval succeeded.
    #[error("answer synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("invalid assistant config: {0}")]
    InvalidConfig(String),
}

impl From<SemanticError> for AssistantError {
    fn from(err: SemanticError) -> Self {
        match err {
            SemanticError::EmptyText => AssistantError::InvalidQuery(err.to_string()),
            SemanticError::InvalidConfig(msg) => AssistantError::InvalidConfig(msg),
            other => AssistantError::BackendUnavailable(other.to_string()),
        }
    }
}

impl From<IndexError> for AssistantError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::InvalidConfig(msg) => AssistantError::InvalidConfig(msg),
            other => AssistantError::BackendUnavailable(other.to_string()),
        }
    }
}

impl From<LlmError> for AssistantError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidConfig(msg) => AssistantError::InvalidConfig(msg),
            other => AssistantError::SynthesisFailed(other.to_string()),
        }
    }
}
