use async_trait::async_trait;

use crate::SemanticError;

/// A source of raw embeddings in the backend's native dimension.
///
/// Implementations are shared process-wide behind an `Arc` and must tolerate concurrent calls.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Encode `text` into a vector of whatever length the model produces.
    async fn encode(&self, text: &str) -> Result<Vec<f32>, SemanticError>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}
