use crate::config::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use munirag::{Assistant, Pipeline};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,

    /// Built once at startup and shared by every request.
    pub pipeline: Arc<Pipeline>,

    /// Renders `/metrics`; `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,

    pub started_at: Instant,
}

impl ServerState {
    pub fn new(config: ServerConfig, pipeline: Pipeline, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics,
            started_at: Instant::now(),
        }
    }

    pub fn assistant(&self) -> &Assistant {
        &self.pipeline.assistant
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
