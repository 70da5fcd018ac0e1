use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use munirag::IndexStats;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Liveness probe. Returns 200 while the process is serving.
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "munirag-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub simulation_mode: bool,
    pub store: Option<String>,
    pub store_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexStats>,
    pub embedding_backend: Option<String>,
    pub completion_backend: String,
    pub completion_model: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// Pipeline status: which tiers are live and what the vector store reports.
///
/// A failing store is reported in the body, never as an error status.
pub async fn pipeline_status(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let pipeline = &state.pipeline;

    let (store_status, index, store_error) = match &pipeline.store {
        None => ("disabled", None, None),
        Some(store) => match store.describe().await {
            Ok(stats) => ("connected", Some(stats), None),
            Err(e) => {
                tracing::warn!(store = store.name(), error = %e, "store describe failed");
                ("error", None, Some(e.to_string()))
            }
        },
    };

    Ok(Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        simulation_mode: pipeline.simulation_mode(),
        store: pipeline.store.as_ref().map(|s| s.name().to_string()),
        store_status,
        store_error,
        index,
        embedding_backend: pipeline.embedding_backend.clone(),
        completion_backend: pipeline.completion_backend.clone(),
        completion_model: pipeline.completion_model.clone(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
