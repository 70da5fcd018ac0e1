//! REST client for a hosted Pinecone index.
//!
//! Talks to the data-plane host of one index (`https://<index>-<project>.svc.<env>.pinecone.io`)
//! with the `Api-Key` header. Only the calls the assistant needs are implemented.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::store::{IndexStats, Match, QueryRequest, Record, VectorStore};
use crate::IndexError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// Data-plane host of the index, with or without scheme.
    pub host: String,
    /// Usually injected from `PINECONE_API_KEY` rather than written to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(with = "semantic::serde_millis")]
    pub timeout: Duration,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct PineconeStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for PineconeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedVector>,
}

#[derive(Deserialize)]
struct FetchedVector {
    id: String,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    vectors: &'a [Record],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    index_fullness: f32,
    #[serde(default)]
    namespaces: HashMap<String, Value>,
}

impl PineconeStore {
    pub fn from_config(cfg: &PineconeConfig) -> Result<Self, IndexError> {
        if cfg.host.trim().is_empty() {
            return Err(IndexError::InvalidConfig("pinecone host is required".into()));
        }
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| IndexError::InvalidConfig("pinecone api key is required".into()))?;
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| IndexError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url(&cfg.host),
            api_key,
        })
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, IndexError> {
        let response = request
            .header("Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IndexError::Unavailable(format!("request timed out: {e}"))
                } else {
                    IndexError::Unavailable(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound(self.base_url.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Unavailable(format!("HTTP error {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))
    }
}

fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn query_body<'a>(request: &QueryRequest<'a>) -> QueryBody<'a> {
    QueryBody {
        vector: request.vector,
        top_k: request.top_k,
        include_metadata: true,
        include_values: false,
        filter: request.filter.map(|f| f.to_json()),
        namespace: request.namespace,
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn query(&self, request: QueryRequest<'_>) -> Result<Vec<Match>, IndexError> {
        let body = query_body(&request);
        let url = format!("{}/query", self.base_url);
        let parsed: QueryResponse = self.send(self.client.post(url).json(&body)).await?;
        Ok(parsed.matches)
    }

    async fn fetch(
        &self,
        ids: &[String],
        namespace: Option<&str>,
    ) -> Result<Vec<Record>, IndexError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        if let Some(ns) = namespace {
            params.push(("namespace", ns));
        }
        let url = format!("{}/vectors/fetch", self.base_url);
        let parsed: FetchResponse = self.send(self.client.get(url).query(&params)).await?;

        // Keep the caller's id order.
        let mut vectors = parsed.vectors;
        Ok(ids
            .iter()
            .filter_map(|id| vectors.remove(id))
            .map(|v| Record {
                id: v.id,
                values: v.values,
                metadata: v.metadata,
            })
            .collect())
    }

    async fn upsert(
        &self,
        records: Vec<Record>,
        namespace: Option<&str>,
    ) -> Result<usize, IndexError> {
        if records.is_empty() {
            return Ok(0);
        }
        let body = UpsertBody {
            vectors: &records,
            namespace,
        };
        let url = format!("{}/vectors/upsert", self.base_url);
        let parsed: UpsertResponse = self.send(self.client.post(url).json(&body)).await?;
        Ok(parsed.upserted_count)
    }

    async fn describe(&self) -> Result<IndexStats, IndexError> {
        let url = format!("{}/describe_index_stats", self.base_url);
        let parsed: StatsResponse = self
            .send(self.client.post(url).json(&serde_json::json!({})))
            .await?;
        let mut namespaces: Vec<String> = parsed.namespaces.into_keys().collect();
        namespaces.sort();
        Ok(IndexStats {
            dimension: parsed.dimension,
            total_vector_count: parsed.total_vector_count,
            index_fullness: parsed.index_fullness,
            namespaces,
        })
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetadataFilter;
    use serde_json::json;

    fn cfg(host: &str) -> PineconeConfig {
        PineconeConfig {
            host: host.into(),
            api_key: Some("pc-test".into()),
            timeout: Duration::from_millis(300),
        }
    }

    #[test]
    fn base_url_adds_scheme_and_trims_slash() {
        assert_eq!(base_url("idx-123.svc.pinecone.io/"), "https://idx-123.svc.pinecone.io");
        assert_eq!(base_url("http://localhost:5080"), "http://localhost:5080");
    }

    #[test]
    fn config_requires_host_and_key() {
        let err = PineconeStore::from_config(&PineconeConfig::default()).unwrap_err();
        assert!(matches!(err, IndexError::InvalidConfig(_)));

        let err = PineconeStore::from_config(&PineconeConfig {
            api_key: None,
            ..cfg("idx.pinecone.io")
        })
        .unwrap_err();
        assert!(matches!(err, IndexError::InvalidConfig(_)));
    }

    #[test]
    fn api_key_is_never_serialized() {
        let s = serde_json::to_value(cfg("idx.pinecone.io")).unwrap();
        assert!(s.get("api_key").is_none());
        assert_eq!(s["timeout"], json!(300));
    }

    #[test]
    fn query_body_uses_camel_case_and_filter_syntax() {
        let v = [0.25f32, 0.5];
        let filter = MetadataFilter::new().contains("source_url", "people");
        let req = QueryRequest::new(&v, 5)
            .with_filter(Some(&filter))
            .with_namespace(Some("docs"));
        let body = serde_json::to_value(query_body(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "vector": [0.25, 0.5],
                "topK": 5,
                "includeMetadata": true,
                "includeValues": false,
                "filter": {"source_url": {"$contains": "people"}},
                "namespace": "docs"
            })
        );

        let bare = serde_json::to_value(query_body(&QueryRequest::new(&v, 1))).unwrap();
        assert!(bare.get("filter").is_none());
        assert!(bare.get("namespace").is_none());
    }

    #[test]
    fn parses_query_and_fetch_responses() {
        let parsed: QueryResponse = serde_json::from_value(json!({
            "matches": [
                {"id": "a", "score": 0.91, "metadata": {"text": "hello"}},
                {"id": "b", "score": -0.2}
            ],
            "namespace": ""
        }))
        .unwrap();
        assert_eq!(parsed.matches.len(), 2);
        assert_eq!(parsed.matches[1].score, -0.2);
        assert!(parsed.matches[1].metadata.is_empty());

        let fetched: FetchResponse = serde_json::from_value(json!({
            "vectors": {
                "phoenixville_mayor_info": {
                    "id": "phoenixville_mayor_info",
                    "values": [0.1],
                    "metadata": {"text": "Mayor info"}
                }
            }
        }))
        .unwrap();
        assert!(fetched.vectors.contains_key("phoenixville_mayor_info"));

        let stats: StatsResponse = serde_json::from_value(json!({
            "dimension": 1536,
            "totalVectorCount": 4200,
            "indexFullness": 0.1,
            "namespaces": {"": {"vectorCount": 4200}}
        }))
        .unwrap();
        assert_eq!(stats.dimension, Some(1536));
        assert_eq!(stats.total_vector_count, 4200);
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let store = PineconeStore::from_config(&cfg("http://127.0.0.1:9")).unwrap();
        let v = [0.1f32];
        let err = store.query(QueryRequest::new(&v, 1)).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));
    }
}
