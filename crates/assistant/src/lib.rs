//! # Municipal assistant (`assistant`)
//!
//! Answers free-text questions about borough services. Given a [`QueryContext`], the
//! [`Assistant`] produces an [`AnswerResult`] or a stream of [`StreamEvent`]s, and never fails
//! because a backend is down: unavailable services only push the query to a lower tier.
//!
//! ## Tiers
//!
//! 1. **Instant intents**: payment, form and map keywords return a portal tag at once.
//! 2. **Common entity**: "who is the fire chief" style questions hit a curated fact table.
//! 3. **Vector answer**: the query is embedded, the vector store searched, and the matching
//!    documents handed to the [`AnswerSynthesizer`]. An answer admitting it found nothing gets
//!    one more look in the fact table.
//! 4. **Simulation**: a canned answer table, used when retrieval is off or came back empty.
//!
//! Guardrail rules check synthesized answers about sensitive topics for a required fact and
//! replace (batch) or annotate (streaming) answers that miss it.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use assistant::{Assistant, AssistantConfig};
//! use llm::LlmConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let completion = llm::from_config(&LlmConfig::ollama("mistral"))?;
//! let assistant = Assistant::builder(AssistantConfig::simulated(), completion).build()?;
//!
//! let answer = assistant.ask("Who is the police chief?").await?;
//! println!("{} ({:?})", answer.result, answer.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! Pass an [`AnswerMetrics`] implementation to
//! [`AssistantBuilder::with_metrics`] to observe tiers, latencies and fallbacks.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod entities;
pub mod error;
pub mod guardrail;
pub mod intents;
pub mod metrics;
pub mod resolver;
pub mod simulation;
pub mod synthesizer;
pub mod types;

pub use crate::config::AssistantConfig;
pub use crate::context::{ContextTag, QueryContext};
pub use crate::dispatcher::{EventStream, StreamingDispatcher};
pub use crate::engine::{Assistant, AssistantBuilder};
pub use crate::entities::{CommonEntities, EntityFact};
pub use crate::error::AssistantError;
pub use crate::guardrail::{GuardrailRule, Guardrails};
pub use crate::intents::{
    FormIntent, FormSpec, InstantIntents, IntentMatcher, MapIntent, MapLayer, PaymentIntent,
};
pub use crate::metrics::{AnswerMetrics, NoopMetrics};
pub use crate::resolver::{FallbackResolver, Resolution, Retrieval};
pub use crate::simulation::{CannedResponse, SimulationTable};
pub use crate::synthesizer::{AnswerSynthesizer, SynthesisConfig};
pub use crate::types::{AnswerResult, Confidence, StreamEvent, Tier};
