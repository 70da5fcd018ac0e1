//! The ordered fallback chain: common entity, then retrieval with synthesis, then simulation.

use std::sync::Arc;

use index::{RetrievedDocument, VectorSearchClient};
use semantic::EmbeddingAdapter;

use crate::context::QueryContext;
use crate::entities::CommonEntities;
use crate::metrics::AnswerMetrics;
use crate::simulation::SimulationTable;
use crate::synthesizer::AnswerSynthesizer;
use crate::types::{Confidence, Tier};
use crate::AssistantError;

/// Embedding plus vector search, the two halves of the retrieval tier.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub adapter: EmbeddingAdapter,
    pub search: VectorSearchClient,
}

/// What a tier produced. Converted into an [`AnswerResult`](crate::AnswerResult) by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub text: String,
    pub documents: Vec<RetrievedDocument>,
    pub tier: Tier,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    CommonEntity,
    VectorAnswer,
    Simulation,
}

pub struct FallbackResolver {
    retrieval: Option<Retrieval>,
    synthesizer: AnswerSynthesizer,
    entities: CommonEntities,
    simulation: SimulationTable,
    simulation_mode: bool,
    metrics: Arc<dyn AnswerMetrics>,
}

impl std::fmt::Debug for FallbackResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackResolver")
            .field("retrieval", &self.retrieval)
            .field("synthesizer", &self.synthesizer)
            .field("simulation_mode", &self.simulation_mode)
            .finish_non_exhaustive()
    }
}

pub(crate) fn fallback_reason(err: &AssistantError) -> &'static str {
    match err {
        AssistantError::NoResultsFound => "no_results",
        AssistantError::SynthesisFailed(_) => "synthesis_failed",
        AssistantError::InvalidQuery(_) => "invalid_query",
        AssistantError::InvalidConfig(_) => "invalid_config",
        AssistantError::BackendUnavailable(_) => "backend_unavailable",
    }
}

impl FallbackResolver {
    pub fn new(
        retrieval: Option<Retrieval>,
        synthesizer: AnswerSynthesizer,
        entities: CommonEntities,
        simulation: SimulationTable,
        simulation_mode: bool,
        metrics: Arc<dyn AnswerMetrics>,
    ) -> Self {
        Self {
            retrieval,
            synthesizer,
            entities,
            simulation,
            simulation_mode,
            metrics,
        }
    }

    pub fn synthesizer(&self) -> &AnswerSynthesizer {
        &self.synthesizer
    }

    /// Whether the retrieval tier can run at all.
    pub fn retrieval_enabled(&self) -> bool {
        !self.simulation_mode && self.retrieval.is_some()
    }

    /// Walk the tiers top-down and return the first usable answer.
    pub async fn resolve(&self, ctx: &QueryContext) -> Resolution {
        let query = ctx.query_text();
        let mut step = Step::CommonEntity;
        loop {
            step = match step {
                Step::CommonEntity => match self.common_entity(query) {
                    Some(resolution) => return resolution,
                    None => Step::VectorAnswer,
                },
                Step::VectorAnswer => match self.vector_answer(ctx).await {
                    Ok(resolution) => return resolution,
                    Err(e) => {
                        tracing::info!(tier = %Tier::VectorAnswer, reason = %e, "falling back to simulation");
                        self.metrics
                            .record_fallback(Tier::VectorAnswer, fallback_reason(&e));
                        Step::Simulation
                    }
                },
                Step::Simulation => return self.simulate(query),
            };
        }
    }

    /// Tier 1.
    pub fn common_entity(&self, query: &str) -> Option<Resolution> {
        let fact = self.entities.lookup(query)?;
        tracing::info!(tier = %Tier::CommonEntity, entity = %fact.name, "common entity match");
        Some(Resolution {
            text: fact.answer.clone(),
            documents: vec![self.entities.source_document()],
            tier: Tier::CommonEntity,
            confidence: Confidence::High,
        })
    }

    /// The single rescue inside tier 2, keeping the retrieved documents as sources.
    fn rescue(&self, query: &str, documents: Vec<RetrievedDocument>) -> Option<Resolution> {
        let fact = self.entities.lookup_named(query)?;
        tracing::info!(entity = %fact.name, "no-information answer rescued by common entity table");
        Some(Resolution {
            text: fact.answer.clone(),
            documents,
            tier: Tier::CommonEntity,
            confidence: Confidence::High,
        })
    }

    /// The documents tier 2 would synthesize from.
    ///
    /// Fails with `BackendUnavailable` when retrieval is off, the embedding came back as the
    /// zero vector, or the store failed; with `NoResultsFound` when nothing cleared the
    /// threshold.
    pub async fn retrieve(
        &self,
        ctx: &QueryContext,
    ) -> Result<Vec<RetrievedDocument>, AssistantError> {
        let retrieval = match (&self.retrieval, self.simulation_mode) {
            (Some(r), false) => r,
            (_, true) => {
                return Err(AssistantError::BackendUnavailable(
                    "simulation mode is on".into(),
                ))
            }
            (None, false) => {
                return Err(AssistantError::BackendUnavailable(
                    "no vector store configured".into(),
                ))
            }
        };

        let query = ctx.query_text();
        let embedding = retrieval.adapter.embed(query).await;
        if embedding.is_zero() {
            return Err(AssistantError::BackendUnavailable(
                "embedding backend returned no vector".into(),
            ));
        }

        let filter = ctx.effective_filter();
        let top_k = retrieval.search.config().top_k;
        let docs = retrieval
            .search
            .search_with_fallback(query, embedding.as_slice(), top_k, filter.as_ref())
            .await?;
        if docs.is_empty() {
            return Err(AssistantError::NoResultsFound);
        }
        tracing::debug!(tier = %Tier::VectorAnswer, documents = docs.len(), "retrieved documents");
        Ok(docs)
    }

    async fn vector_answer(&self, ctx: &QueryContext) -> Result<Resolution, AssistantError> {
        let query = ctx.query_text();
        let documents = self.retrieve(ctx).await?;
        let confidence = Confidence::of_documents(&documents);

        let text = match self.synthesizer.try_synthesize(query, &documents).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(tier = %Tier::VectorAnswer, error = %e, "synthesis failed, apologising");
                self.metrics
                    .record_fallback(Tier::VectorAnswer, fallback_reason(&e));
                self.synthesizer.apology(query)
            }
        };

        if self.synthesizer.is_no_info(&text) {
            if let Some(rescued) = self.rescue(query, documents.clone()) {
                return Ok(rescued);
            }
        }

        Ok(Resolution {
            text,
            documents,
            tier: Tier::VectorAnswer,
            confidence,
        })
    }

    /// Tier 3.
    pub fn simulate(&self, query: &str) -> Resolution {
        tracing::info!(tier = %Tier::Simulation, "answering from simulation table");
        Resolution {
            text: self.simulation.answer(query),
            documents: Vec::new(),
            tier: Tier::Simulation,
            confidence: Confidence::Low,
        }
    }
}
