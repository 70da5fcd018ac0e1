//! API route handlers
//!
//! - `health`: liveness, pipeline status and Prometheus metrics
//! - `query`: batch and streamed answers

pub mod health;
pub mod query;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info (GET /)
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "munirag",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/query",
            "/query-stream",
            "/status",
            "/health",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
