use std::time::Duration;

use crate::types::Tier;

/// Observer for answer outcomes.
///
/// Installed per [`Assistant`](crate::Assistant) with
/// [`with_metrics`](crate::Assistant::with_metrics); the default records nothing.
pub trait AnswerMetrics: Send + Sync {
    /// One batch answer was produced.
    fn record_answer(&self, tier: Tier, latency: Duration, documents: usize);

    /// A streamed answer finished; `tokens` counts relayed events before the terminal one.
    fn record_stream(&self, _tier: Tier, _tokens: usize) {}

    /// A tier failed and the resolver moved on. `reason` is a short static label.
    fn record_fallback(&self, _from: Tier, _reason: &'static str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl AnswerMetrics for NoopMetrics {
    fn record_answer(&self, _tier: Tier, _latency: Duration, _documents: usize) {}
}
