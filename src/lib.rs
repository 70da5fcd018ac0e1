//! Workspace umbrella crate for the municipal assistant.
//!
//! This crate reads a single YAML document ([`RagConfig`]), builds the concrete embedding,
//! vector store and completion backends it names, and wires them into an [`Assistant`]. It
//! also re-exports the types callers need so one dependency is enough.

pub mod config;

pub use crate::config::{ConfigLoadError, IndexYamlConfig, RagConfig};

pub use assistant::{
    AnswerMetrics, AnswerResult, Assistant, AssistantBuilder, AssistantConfig, AssistantError,
    Confidence, ContextTag, EventStream, NoopMetrics, QueryContext, StreamEvent, Tier,
};
pub use index::{
    InMemoryVectorStore, IndexError, IndexStats, MetadataFilter, PineconeStore, Record,
    RetrievedDocument, SearchConfig, VectorSearchClient, VectorStore,
};
pub use llm::{CompletionBackend, LlmConfig, LlmError, TokenStream};
pub use semantic::{EmbeddingAdapter, SemanticConfig, SemanticError};

use std::sync::Arc;

use thiserror::Error;

/// Errors raised while turning a [`RagConfig`] into a running [`Pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigLoadError),

    #[error("embedding backend: {0}")]
    Semantic(#[from] SemanticError),

    #[error("vector store: {0}")]
    Index(#[from] IndexError),

    #[error("completion backend: {0}")]
    Llm(#[from] LlmError),

    #[error("assistant: {0}")]
    Assistant(#[from] AssistantError),
}

/// A wired assistant plus the handles status reporting needs.
pub struct Pipeline {
    pub assistant: Assistant,
    /// The store behind the retrieval tier; `None` when answers come from canned tables only.
    pub store: Option<Arc<dyn VectorStore>>,
    /// Name of the embedding backend, when retrieval is wired.
    pub embedding_backend: Option<String>,
    pub completion_backend: String,
    pub completion_model: String,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("assistant", &self.assistant)
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .field("embedding_backend", &self.embedding_backend)
            .field("completion_backend", &self.completion_backend)
            .field("completion_model", &self.completion_model)
            .finish()
    }
}

impl Pipeline {
    pub fn simulation_mode(&self) -> bool {
        !self.assistant.retrieval_enabled()
    }
}

/// Build every backend named in `cfg` and wire them into a [`Pipeline`].
pub fn build_pipeline(
    cfg: &RagConfig,
    metrics: Arc<dyn AnswerMetrics>,
) -> Result<Pipeline, PipelineError> {
    let completion = llm::from_config(&cfg.llm)?;
    assemble(cfg, completion, metrics)
}

/// Like [`build_pipeline`], with a caller-supplied completion backend.
///
/// A Pinecone backend without an API key is not an error: the assistant then answers from its
/// canned tables, as if `simulation_mode` were set.
pub fn assemble(
    cfg: &RagConfig,
    completion: Arc<dyn CompletionBackend>,
    metrics: Arc<dyn AnswerMetrics>,
) -> Result<Pipeline, PipelineError> {
    cfg.validate()?;

    let completion_backend = completion.name().to_string();
    let mut assistant_cfg = cfg.assistant.clone();
    let store = if assistant_cfg.simulation_mode {
        None
    } else {
        let store = open_store(cfg)?;
        if store.is_none() {
            tracing::warn!("no Pinecone API key provided, running in simulation mode");
            assistant_cfg.simulation_mode = true;
        }
        store
    };

    let mut builder = Assistant::builder(assistant_cfg, completion).with_metrics(metrics);
    let mut embedding_backend = None;
    if let Some(store) = &store {
        let adapter = EmbeddingAdapter::from_config(&cfg.semantic)?;
        embedding_backend = Some(adapter.backend_name().to_string());
        let search = VectorSearchClient::new(store.clone(), cfg.index.search.clone());
        builder = builder.with_retrieval(adapter, search);
    }
    let assistant = builder.build()?;

    tracing::info!(
        store = store.as_ref().map(|s| s.name()).unwrap_or("none"),
        embedding = embedding_backend.as_deref().unwrap_or("none"),
        completion = %completion_backend,
        model = %cfg.llm.model,
        "pipeline assembled"
    );

    Ok(Pipeline {
        assistant,
        store,
        embedding_backend,
        completion_backend,
        completion_model: cfg.llm.model.clone(),
    })
}

/// The configured store, or `None` when Pinecone has no API key.
fn open_store(cfg: &RagConfig) -> Result<Option<Arc<dyn VectorStore>>, PipelineError> {
    match cfg.index.backend.as_str() {
        "in_memory" => Ok(Some(Arc::new(
            InMemoryVectorStore::new().with_dimension(cfg.semantic.target_dim),
        ))),
        "pinecone" => {
            let has_key = cfg
                .index
                .pinecone
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty());
            if !has_key {
                return Ok(None);
            }
            Ok(Some(Arc::new(PineconeStore::from_config(&cfg.index.pinecone)?)))
        }
        other => Err(ConfigLoadError::Validation(format!("unknown index backend '{other}'")).into()),
    }
}
