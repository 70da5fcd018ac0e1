//! munirag server - HTTP API for the municipal assistant
//!
//! A thin axum layer over the two answering entry points. Request bodies are validated into a
//! `QueryContext` at the boundary; everything past that is the pipeline's job.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /status` - Pipeline status and vector store statistics
//! - `GET /metrics` - Prometheus metrics
//! - `POST /query` - Answer a query, `{"query": "...", "context": "people"}`
//! - `POST /query-stream` - Same body, answer streamed as NDJSON `{"token", "done"}` lines

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
