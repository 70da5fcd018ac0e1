use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use munirag::{AnswerResult, ContextTag, MetadataFilter, QueryContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NDJSON: &str = "application/x-ndjson";

/// Body of `POST /query` and `POST /query-stream`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    /// Topic hint: `general`, `people`, `documents` or `departments`.
    #[serde(default)]
    pub context: ContextTag,
    /// Raw metadata filter; overrides the one implied by `context`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
}

impl QueryRequest {
    /// Validate into a [`QueryContext`]. Blank queries are rejected here.
    pub fn into_context(self) -> ServerResult<QueryContext> {
        let mut ctx = QueryContext::new(&self.query)?.with_tag(self.context);
        if let Some(raw) = self.filter {
            ctx = ctx.with_filter(MetadataFilter::from_json(&raw)?);
        }
        Ok(ctx)
    }
}

fn parse(body: Result<Json<QueryRequest>, JsonRejection>) -> ServerResult<QueryContext> {
    let Json(request) = body?;
    request.into_context()
}

/// Answer one query (POST /query)
pub async fn query(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ServerResult<Json<AnswerResult>> {
    let ctx = parse(body)?;
    let answer = state.assistant().answer_query(&ctx).await?;
    Ok(Json(answer))
}

/// Stream one query's answer as newline-delimited JSON events (POST /query-stream)
///
/// Each line is `{"token": ..., "done": ...}`; the last line has `done: true`. Closing the
/// connection drops the event stream, which abandons generation.
pub async fn query_stream(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ServerResult<Response> {
    let ctx = parse(body)?;
    let events = state.assistant().stream_answer(&ctx).await?;

    let lines = events.map(|event| {
        serde_json::to_vec(&event).map(|mut line| {
            line.push(b'\n');
            Bytes::from(line)
        })
    });

    Ok((
        [
            (header::CONTENT_TYPE, NDJSON),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults() {
        let req: QueryRequest = serde_json::from_value(json!({"query": "trash day"})).unwrap();
        assert_eq!(req.context, ContextTag::General);
        assert!(req.filter.is_none());
    }

    #[test]
    fn blank_query_is_invalid() {
        let req = QueryRequest {
            query: "   ".into(),
            ..QueryRequest::default()
        };
        assert!(matches!(
            req.into_context(),
            Err(ServerError::InvalidQuery(_))
        ));
    }

    #[test]
    fn explicit_filter_is_parsed() {
        let req: QueryRequest = serde_json::from_value(json!({
            "query": "parks director",
            "context": "people",
            "filter": {"source_title": {"$contains": "Parks"}}
        }))
        .unwrap();
        let ctx = req.into_context().unwrap();
        assert_eq!(ctx.context_tag(), ContextTag::People);
        assert!(ctx.metadata_filter().is_some());
    }
}
