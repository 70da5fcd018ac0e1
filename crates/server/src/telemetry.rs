//! Prometheus export of assistant activity.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use munirag::{AnswerMetrics, Tier};

/// Forwards assistant observations to the process-wide `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl PrometheusMetrics {
    /// Register metric descriptions with the installed recorder.
    pub fn describe() {
        describe_counter!("munirag_answers_total", "Answers produced, by tier");
        describe_histogram!(
            "munirag_answer_latency_seconds",
            Unit::Seconds,
            "Time to produce a batch answer"
        );
        describe_histogram!(
            "munirag_answer_documents",
            Unit::Count,
            "Source documents attached to a batch answer"
        );
        describe_counter!("munirag_streams_total", "Streams opened, by tier");
        describe_histogram!(
            "munirag_stream_tokens",
            Unit::Count,
            "Tokens relayed per synthesized stream"
        );
        describe_counter!(
            "munirag_fallbacks_total",
            "Times a tier gave up and handed the query down"
        );
        describe_counter!("munirag_http_requests_total", "HTTP requests, by status");
    }
}

impl AnswerMetrics for PrometheusMetrics {
    fn record_answer(&self, tier: Tier, latency: Duration, documents: usize) {
        counter!("munirag_answers_total", "tier" => tier.as_str()).increment(1);
        histogram!("munirag_answer_latency_seconds", "tier" => tier.as_str())
            .record(latency.as_secs_f64());
        histogram!("munirag_answer_documents", "tier" => tier.as_str()).record(documents as f64);
    }

    fn record_stream(&self, tier: Tier, tokens: usize) {
        counter!("munirag_streams_total", "tier" => tier.as_str()).increment(1);
        if tier == Tier::VectorAnswer {
            histogram!("munirag_stream_tokens").record(tokens as f64);
        }
    }

    fn record_fallback(&self, from: Tier, reason: &'static str) {
        counter!("munirag_fallbacks_total", "from" => from.as_str(), "reason" => reason)
            .increment(1);
    }
}

/// Install the Prometheus recorder globally and return the handle that renders it.
///
/// Can only succeed once per process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    PrometheusMetrics::describe();
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_reach_the_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let m = PrometheusMetrics;
            m.record_answer(Tier::CommonEntity, Duration::from_millis(12), 1);
            m.record_answer(Tier::CommonEntity, Duration::from_millis(8), 1);
            m.record_stream(Tier::VectorAnswer, 42);
            m.record_fallback(Tier::VectorAnswer, "no_results");
        });

        let text = handle.render();
        assert!(text.contains("munirag_answers_total{tier=\"common_entity\"} 2"));
        assert!(text.contains("munirag_streams_total{tier=\"vector_answer\"} 1"));
        let fallback = text
            .lines()
            .find(|l| l.starts_with("munirag_fallbacks_total{"))
            .unwrap();
        assert!(fallback.contains("reason=\"no_results\""));
        assert!(fallback.ends_with(" 1"));
    }
}
