use thiserror::Error;

/// Errors raised by vector stores and the search client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// The store could not be reached, or answered with a non-2xx status.
    #[error("vector store unavailable: {0}")]
    Unavailable(String),
    /// The store call exceeded its timeout.
    #[error("vector store call timed out after {0} ms")]
    Timeout(u64),
    /// The named index or namespace does not exist.
    #[error("index not found: {0}")]
    NotFound(String),
    /// The store answered with a payload we could not decode.
    #[error("malformed store response: {0}")]
    Decode(String),
    /// A metadata filter could not be parsed.
    #[error("invalid metadata filter: {0}")]
    InvalidFilter(String),
    #[error("invalid index config: {0}")]
    InvalidConfig(String),
    #[error("vector has dimension {got}, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    /// Local backend failure (e.g., a poisoned lock).
    #[error("backend error: {0}")]
    Backend(String),
}

impl IndexError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        assert_eq!(
            IndexError::Timeout(1500).to_string(),
            "vector store call timed out after 1500 ms"
        );
        assert!(IndexError::backend("poisoned lock")
            .to_string()
            .contains("poisoned lock"));
    }
}
