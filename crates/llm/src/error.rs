use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("invalid llm config: {0}")]
    InvalidConfig(String),
    /// Network failure or non-2xx status from the completion service.
    #[error("completion backend unavailable: {0}")]
    Unavailable(String),
    #[error("completion timed out after {0} ms")]
    Timeout(u64),
    /// The service answered, but not in a shape we understand.
    #[error("malformed completion response: {0}")]
    Decode(String),
    #[error("completion backend returned no text")]
    EmptyResponse,
}
