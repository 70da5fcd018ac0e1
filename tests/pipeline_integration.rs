//! End-to-end tests of a pipeline assembled from YAML.
//!
//! The vector store is the in-memory backend and embeddings use the deterministic `fast`
//! mode, so only the completion backend needs mocking.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use munirag::{
    AnswerMetrics, CompletionBackend, ContextTag, EmbeddingAdapter, LlmError, NoopMetrics,
    Pipeline, QueryContext, RagConfig, Record, StreamEvent, Tier, TokenStream, assemble,
};
use tempfile::NamedTempFile;

const QUERY: &str = "When does leaf collection start this autumn?";

struct ScriptedLlm {
    answer: String,
    tokens: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(answer: &str, tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionBackend for ScriptedLlm {
    async fn complete(&self, prompt: &str, _system_prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        _system_prompt: &str,
    ) -> Result<TokenStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let tokens: Vec<Result<String, LlmError>> =
            self.tokens.iter().cloned().map(Ok).collect();
        Ok(stream::iter(tokens).boxed())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

fn in_memory_config() -> RagConfig {
    let file = write_config(
        r#"
version: "1.0"
name: "integration"
semantic:
  mode: "fast"
  fast_dim: 64
  target_dim: 128
index:
  backend: "in_memory"
  search:
    score_threshold: 0.4
    top_k: 5
llm:
  provider: "ollama"
  model: "mistral"
"#,
    );
    RagConfig::from_file(file.path()).unwrap()
}

fn pipeline_with(cfg: &RagConfig, llm: Arc<ScriptedLlm>) -> Pipeline {
    assemble(cfg, llm, Arc::new(NoopMetrics)).unwrap()
}

/// Store `text` under a vector identical to the embedding of `QUERY`.
async fn seed(pipeline: &Pipeline, cfg: &RagConfig, id: &str, text: &str, title: &str, url: &str) {
    let adapter = EmbeddingAdapter::from_config(&cfg.semantic).unwrap();
    let vector = adapter.embed(QUERY).await.into_inner();
    let record = Record::new(id, vector)
        .with_metadata("text", text)
        .with_metadata("source_title", title)
        .with_metadata("source_url", url);
    let store = pipeline.store.as_ref().unwrap();
    assert_eq!(store.upsert(vec![record], None).await.unwrap(), 1);
}

#[tokio::test]
async fn answers_from_seeded_store() {
    let cfg = in_memory_config();
    let llm = ScriptedLlm::new("Leaf collection begins the first week of October.", &[]);
    let pipeline = pipeline_with(&cfg, llm.clone());
    assert!(!pipeline.simulation_mode());
    assert_eq!(pipeline.embedding_backend.as_deref(), Some("fast"));
    assert_eq!(pipeline.completion_backend, "scripted");

    seed(
        &pipeline,
        &cfg,
        "leaf-1",
        "Curbside leaf collection runs from October through December.",
        "Public Works",
        "https://phoenixville.org/public-works",
    )
    .await;

    let answer = pipeline.assistant.ask(QUERY).await.unwrap();
    assert_eq!(answer.tier, Tier::VectorAnswer);
    assert_eq!(
        answer.result,
        "Leaf collection begins the first week of October."
    );
    let top = &answer.source_documents[0];
    assert_eq!(top.source, "Public Works (https://phoenixville.org/public-works)");
    assert!(top.score > 0.99);

    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Curbside leaf collection runs from October"));
    assert!(prompts[0].contains(QUERY));
}

#[tokio::test]
async fn empty_store_falls_through_to_simulation() {
    let cfg = in_memory_config();
    let llm = ScriptedLlm::new("unused", &[]);
    let pipeline = pipeline_with(&cfg, llm.clone());

    let answer = pipeline.assistant.ask(QUERY).await.unwrap();
    assert_eq!(answer.tier, Tier::Simulation);
    assert!(answer.result.contains(QUERY));
    assert!(answer.source_documents.is_empty());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn common_entity_never_reaches_completion() {
    let cfg = in_memory_config();
    let llm = ScriptedLlm::new("unused", &[]);
    let pipeline = pipeline_with(&cfg, llm.clone());

    let answer = pipeline.assistant.ask("Who is the borough manager?").await.unwrap();
    assert_eq!(answer.tier, Tier::CommonEntity);
    assert!(answer.result.contains("E. Jean Krack"));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn context_tag_narrows_sources() {
    let cfg = in_memory_config();
    let llm = ScriptedLlm::new("See the staff directory.", &[]);
    let pipeline = pipeline_with(&cfg, llm);

    seed(
        &pipeline,
        &cfg,
        "staff",
        "Public Works staff directory.",
        "Staff",
        "https://phoenixville.org/people/public-works",
    )
    .await;
    seed(
        &pipeline,
        &cfg,
        "schedule",
        "Leaf collection schedule PDF.",
        "Leaf Schedule",
        "https://phoenixville.org/DocumentCenter/leaf.pdf",
    )
    .await;

    let ctx = QueryContext::new(QUERY).unwrap().with_tag(ContextTag::People);
    let answer = pipeline.assistant.answer_query(&ctx).await.unwrap();
    assert_eq!(answer.source_documents.len(), 1);
    assert!(answer.source_documents[0].source.contains("/people/"));

    let ctx = QueryContext::new(QUERY).unwrap().with_tag(ContextTag::Documents);
    let answer = pipeline.assistant.answer_query(&ctx).await.unwrap();
    assert_eq!(answer.source_documents.len(), 1);
    assert!(answer.source_documents[0].source.contains("DocumentCenter"));

    let ctx = QueryContext::new(QUERY).unwrap();
    let answer = pipeline.assistant.answer_query(&ctx).await.unwrap();
    assert_eq!(answer.source_documents.len(), 2);
}

#[tokio::test]
async fn streams_synthesized_tokens_in_order() {
    let cfg = in_memory_config();
    let llm = ScriptedLlm::new("unused", &["Leaf", " pickup", " starts", " in October."]);
    let pipeline = pipeline_with(&cfg, llm);
    seed(
        &pipeline,
        &cfg,
        "leaf-1",
        "Curbside leaf collection runs from October through December.",
        "Public Works",
        "https://phoenixville.org/public-works",
    )
    .await;

    let events: Vec<StreamEvent> = pipeline
        .assistant
        .ask_stream(QUERY)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(
        events,
        vec![
            StreamEvent::token("Leaf"),
            StreamEvent::token(" pickup"),
            StreamEvent::token(" starts"),
            StreamEvent::token(" in October."),
            StreamEvent::done(),
        ]
    );
}

#[tokio::test]
async fn missing_pinecone_key_means_simulation() {
    let file = write_config(
        r#"
version: "1.0"
index:
  backend: "pinecone"
  pinecone:
    host: "phoenixville-abc123.svc.us-east-1.pinecone.io"
llm:
  provider: "ollama"
  model: "mistral"
"#,
    );
    let cfg = RagConfig::from_file(file.path()).unwrap();
    let llm = ScriptedLlm::new("unused", &[]);
    let pipeline = pipeline_with(&cfg, llm.clone());

    assert!(pipeline.simulation_mode());
    assert!(pipeline.store.is_none());
    assert!(pipeline.embedding_backend.is_none());

    let answer = pipeline.assistant.ask("trash collection day").await.unwrap();
    assert_eq!(answer.tier, Tier::Simulation);
    assert!(answer.result.starts_with("Trash collection in Phoenixville occurs weekly"));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_queries_share_one_pipeline() {
    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl AnswerMetrics for Counting {
        fn record_answer(&self, _tier: Tier, _latency: std::time::Duration, _documents: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let cfg = in_memory_config();
    let metrics = Arc::new(Counting::default());
    let llm = ScriptedLlm::new("Leaf collection begins in October.", &[]);
    let pipeline = assemble(&cfg, llm, metrics.clone()).unwrap();
    seed(
        &pipeline,
        &cfg,
        "leaf-1",
        "Curbside leaf collection runs from October through December.",
        "Public Works",
        "https://phoenixville.org/public-works",
    )
    .await;

    let queries = [QUERY, "Who is the police chief?", QUERY, "how do i pay my water bill"];
    let answers =
        futures::future::join_all(queries.iter().map(|q| pipeline.assistant.ask(q))).await;

    let tiers: Vec<Tier> = answers.into_iter().map(|a| a.unwrap().tier).collect();
    assert_eq!(
        tiers,
        vec![
            Tier::VectorAnswer,
            Tier::CommonEntity,
            Tier::VectorAnswer,
            Tier::Instant
        ]
    );
    assert_eq!(metrics.0.load(Ordering::SeqCst), 4);
}

#[test]
fn invalid_assistant_tables_fail_assembly() {
    let file = write_config(
        r#"
version: "1.0"
index:
  backend: "in_memory"
llm:
  provider: "ollama"
assistant:
  guardrails:
    - topic: "(unclosed"
      required: "x"
      correction: "y"
      note: "z"
"#,
    );
    let cfg = RagConfig::from_file(file.path()).unwrap();
    let err = assemble(&cfg, ScriptedLlm::new("", &[]), Arc::new(NoopMetrics)).unwrap_err();
    assert!(err.to_string().contains("assistant"));
}
