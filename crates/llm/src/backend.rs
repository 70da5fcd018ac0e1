use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::LlmError;

/// Tokens in generation order. Dropping the stream abandons the generation.
pub type TokenStream = BoxStream<'static, Result<String, LlmError>>;

/// An opaque text-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate the whole answer in one call.
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, LlmError>;

    /// Start a generation and hand back its tokens as they arrive.
    ///
    /// Errors that happen before the first byte are returned directly; later ones surface as
    /// an `Err` item inside the stream.
    async fn stream_complete(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<TokenStream, LlmError>;

    fn name(&self) -> &str;
}
