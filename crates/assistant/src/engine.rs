use std::sync::Arc;
use std::time::Instant;

use index::VectorSearchClient;
use llm::CompletionBackend;
use semantic::EmbeddingAdapter;

use crate::config::AssistantConfig;
use crate::context::QueryContext;
use crate::dispatcher::{EventStream, StreamingDispatcher};
use crate::guardrail::Guardrails;
use crate::intents::IntentMatcher;
use crate::metrics::{AnswerMetrics, NoopMetrics};
use crate::resolver::{fallback_reason, FallbackResolver, Resolution, Retrieval};
use crate::synthesizer::AnswerSynthesizer;
use crate::types::{AnswerResult, Confidence, Tier};
use crate::AssistantError;


/// Answers municipal questions, batch or streamed.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and keeps no per-request state.
pub struct Assistant {
    intents: IntentMatcher,
    resolver: FallbackResolver,
    dispatcher: StreamingDispatcher,
    metrics: Arc<dyn AnswerMetrics>,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("resolver", &self.resolver)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Collects the backends for an [`Assistant`].
pub struct AssistantBuilder {
    cfg: AssistantConfig,
    completion: Arc<dyn CompletionBackend>,
    retrieval: Option<Retrieval>,
    metrics: Arc<dyn AnswerMetrics>,
}

impl AssistantBuilder {
    /// Enable the retrieval tier.
    pub fn with_retrieval(mut self, adapter: EmbeddingAdapter, search: VectorSearchClient) -> Self {
        self.retrieval = Some(Retrieval { adapter, search });
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn AnswerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> Result<Assistant, AssistantError> {
        self.cfg.validate()?;
        let guardrails = Guardrails::compile(&self.cfg.guardrails)?;
        let intents = self.cfg.intents.compile()?;
        let synthesizer =
            AnswerSynthesizer::new(self.completion, self.cfg.synthesis.clone(), guardrails);
        let dispatcher = StreamingDispatcher::new(&self.cfg.synthesis, self.metrics.clone());

        if self.cfg.simulation_mode {
            tracing::info!("assistant running in simulation mode");
        } else if self.retrieval.is_none() {
            tracing::warn!("no retrieval backend configured, answers will come from canned tables");
        }

        let resolver = FallbackResolver::new(
            self.retrieval,
            synthesizer,
            self.cfg.entities,
            self.cfg.simulation,
            self.cfg.simulation_mode,
            self.metrics.clone(),
        );

        Ok(Assistant {
            intents,
            resolver,
            dispatcher,
            metrics: self.metrics,
        })
    }
}

impl Assistant {
    pub fn builder(cfg: AssistantConfig, completion: Arc<dyn CompletionBackend>) -> AssistantBuilder {
        AssistantBuilder {
            cfg,
            completion,
            retrieval: None,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Whether answers can come from the vector store.
    pub fn retrieval_enabled(&self) -> bool {
        self.resolver.retrieval_enabled()
    }

    /// Validate `query_text` and answer it.
    pub async fn ask(&self, query_text: &str) -> Result<AnswerResult, AssistantError> {
        let ctx = QueryContext::new(query_text)?;
        self.answer_query(&ctx).await
    }

    /// Answer one query.
    ///
    /// Backend failures never surface here; they become a lower tier's answer. The only error
    /// is `InvalidQuery`, returned before any backend is touched.
    pub async fn answer_query(&self, ctx: &QueryContext) -> Result<AnswerResult, AssistantError> {
        let query = ctx.query_text();
        if query.trim().is_empty() {
            return Err(AssistantError::InvalidQuery(
                "query text must not be empty".into(),
            ));
        }

        let start = Instant::now();
        let resolution = match self.intents.resolve(query) {
            Some(text) => Resolution {
                text,
                documents: Vec::new(),
                tier: Tier::Instant,
                confidence: Confidence::High,
            },
            None => self.resolver.resolve(ctx).await,
        };
        let latency = start.elapsed();

        tracing::info!(
            tier = %resolution.tier,
            documents = resolution.documents.len(),
            elapsed_ms = latency.as_millis() as u64,
            "answered query"
        );
        self.metrics
            .record_answer(resolution.tier, latency, resolution.documents.len());

        Ok(AnswerResult {
            result: resolution.text,
            source_documents: resolution.documents,
            processing_time: latency.as_secs_f64(),
            confidence: resolution.confidence,
            tier: resolution.tier,
        })
    }

    /// Validate `query_text` and stream its answer.
    pub async fn ask_stream(&self, query_text: &str) -> Result<EventStream, AssistantError> {
        let ctx = QueryContext::new(query_text)?;
        self.stream_answer(&ctx).await
    }

    /// Stream one query's answer.
    ///
    /// Canned answers (intents, common entities, simulation) arrive as a single terminal event.
    /// Synthesized answers are relayed token by token. Retrieval and the start of generation
    /// are awaited here; the returned stream then only pulls tokens.
    pub async fn stream_answer(&self, ctx: &QueryContext) -> Result<EventStream, AssistantError> {
        let query = ctx.query_text();
        if query.trim().is_empty() {
            return Err(AssistantError::InvalidQuery(
                "query text must not be empty".into(),
            ));
        }

        if let Some(text) = self.intents.resolve(query) {
            return Ok(self.dispatcher.instant(Tier::Instant, text));
        }
        if let Some(resolution) = self.resolver.common_entity(query) {
            return Ok(self.dispatcher.instant(resolution.tier, resolution.text));
        }

        let documents = match self.resolver.retrieve(ctx).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::info!(tier = %Tier::VectorAnswer, reason = %e, "streaming simulated answer");
                self.metrics
                    .record_fallback(Tier::VectorAnswer, fallback_reason(&e));
                let resolution = self.resolver.simulate(query);
                return Ok(self.dispatcher.instant(resolution.tier, resolution.text));
            }
        };

        let synthesizer = self.resolver.synthesizer();
        match synthesizer.stream(query, &documents).await {
            Ok(tokens) => Ok(self
                .dispatcher
                .relay(tokens, query, synthesizer.guardrails().clone())),
            Err(e) => {
                tracing::error!(error = %e, "failed to start streamed synthesis");
                Ok(self.dispatcher.failed())
            }
        }
    }
}
