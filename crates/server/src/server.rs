//! Server initialization and routing

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{api_info, health, not_found, query};
use crate::state::ServerState;
use crate::telemetry::{self, PrometheusMetrics};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use munirag::{build_pipeline, AnswerMetrics, NoopMetrics, RagConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// The streaming route is kept out of the compression layer so tokens are flushed as they
/// are produced.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let buffered = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/status", get(health::pipeline_status))
        .route("/metrics", get(health::metrics))
        .route("/query", post(query::query))
        .layer(CompressionLayer::new());

    let streaming = Router::new().route("/query-stream", post(query::query_stream));

    Router::new()
        .merge(buffered)
        .merge(streaming)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the pipeline YAML named by `config`, or defaults, and apply environment secrets.
pub fn load_pipeline_config(config: &ServerConfig) -> anyhow::Result<RagConfig> {
    let mut rag = match &config.pipeline_config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading pipeline config");
            RagConfig::from_file(path)?
        }
        None => {
            tracing::warn!("no pipeline_config set, using built-in defaults");
            RagConfig::default()
        }
    };
    rag.apply_env();
    rag.validate()?;
    Ok(rag)
}

/// Start the HTTP server
///
/// Blocks until SIGTERM or Ctrl+C, then drains in-flight requests.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .json()
        .init();

    let handle = if config.metrics_enabled {
        Some(telemetry::install_recorder()?)
    } else {
        None
    };
    let answer_metrics: Arc<dyn AnswerMetrics> = if handle.is_some() {
        Arc::new(PrometheusMetrics)
    } else {
        Arc::new(NoopMetrics)
    };

    let rag = load_pipeline_config(&config)?;
    let pipeline = build_pipeline(&rag, answer_metrics)?;
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        %addr,
        simulation_mode = pipeline.simulation_mode(),
        completion = %pipeline.completion_backend,
        model = %pipeline.completion_model,
        "starting munirag server"
    );
    tracing::info!(
        timeout_secs = config.timeout_secs,
        max_body_kb = config.max_body_size_kb,
        cors = config.enable_cors,
        metrics = config.metrics_enabled,
        "server limits"
    );

    let state = Arc::new(ServerState::new(config, pipeline, handle));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
