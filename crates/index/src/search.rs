use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::store::{Match, QueryRequest, Record, VectorStore};
use crate::{IndexError, MetadataFilter};

pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// A retrieved snippet ready for synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Never empty.
    pub content: String,
    /// Human-readable origin, e.g. `"Trash Collection (https://...)"`.
    pub source: String,
    /// Raw store similarity.
    pub score: f32,
}

/// Last-resort fetch-by-id for queries that name a known entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectLookup {
    /// Case-insensitive substring that must appear in the query.
    pub keyword: String,
    pub record_id: String,
    /// Source label given to the fetched document.
    pub source: String,
}

impl DirectLookup {
    pub fn new(
        keyword: impl Into<String>,
        record_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            record_id: record_id.into(),
            source: source.into(),
        }
    }

    fn applies_to(&self, query_lower: &str) -> bool {
        !self.keyword.is_empty() && query_lower.contains(&self.keyword.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Matches scoring strictly below this are dropped.
    pub score_threshold: f32,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Metadata key holding the snippet text.
    pub text_key: String,
    pub title_key: String,
    pub url_key: String,
    #[serde(with = "semantic::serde_millis")]
    pub timeout: Duration,
    pub direct_lookups: Vec<DirectLookup>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.4,
            top_k: 5,
            namespace: None,
            text_key: "text".into(),
            title_key: "source_title".into(),
            url_key: "source_url".into(),
            timeout: Duration::from_secs(10),
            direct_lookups: vec![DirectLookup::new(
                "mayor",
                "phoenixville_mayor_info",
                "phoenixville_mayor_info.txt",
            )],
        }
    }
}

/// Thresholded similarity search over a shared [`VectorStore`].
#[derive(Clone)]
pub struct VectorSearchClient {
    store: Arc<dyn VectorStore>,
    cfg: SearchConfig,
}

impl std::fmt::Debug for VectorSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSearchClient")
            .field("store", &self.store.name())
            .field("cfg", &self.cfg)
            .finish()
    }
}

impl VectorSearchClient {
    pub fn new(store: Arc<dyn VectorStore>, cfg: SearchConfig) -> Self {
        Self { store, cfg }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.cfg
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Query the store and keep the matches that clear the threshold and carry text.
    ///
    /// Store order is preserved; nothing is re-sorted.
    pub async fn try_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedDocument>, IndexError> {
        let request = QueryRequest::new(embedding, top_k)
            .with_filter(filter)
            .with_namespace(self.cfg.namespace.as_deref());

        let matches = tokio::time::timeout(self.cfg.timeout, self.store.query(request))
            .await
            .map_err(|_| IndexError::Timeout(self.cfg.timeout.as_millis() as u64))??;

        let total = matches.len();
        let docs: Vec<RetrievedDocument> = matches
            .into_iter()
            .filter(|m| m.score >= self.cfg.score_threshold)
            .filter_map(|m| self.to_document(m))
            .collect();

        tracing::debug!(
            store = self.store.name(),
            matches = total,
            kept = docs.len(),
            threshold = self.cfg.score_threshold,
            "vector search complete"
        );
        Ok(docs)
    }

    /// Like [`try_search`](Self::try_search), but store failures become an empty result.
    pub async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<RetrievedDocument> {
        match self.try_search(embedding, top_k, filter).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(store = self.store.name(), error = %e, "vector search failed");
                Vec::new()
            }
        }
    }

    /// Fetch the record registered for `query_text` in the direct lookup table, if any.
    pub async fn direct_lookup(
        &self,
        query_text: &str,
    ) -> Result<Vec<RetrievedDocument>, IndexError> {
        let lower = query_text.to_lowercase();
        let Some(lookup) = self.cfg.direct_lookups.iter().find(|l| l.applies_to(&lower)) else {
            return Ok(Vec::new());
        };

        let ids = [lookup.record_id.clone()];
        let records = tokio::time::timeout(
            self.cfg.timeout,
            self.store.fetch(&ids, self.cfg.namespace.as_deref()),
        )
        .await
        .map_err(|_| IndexError::Timeout(self.cfg.timeout.as_millis() as u64))??;

        let docs: Vec<RetrievedDocument> = records
            .into_iter()
            .filter_map(|rec| self.lookup_document(rec, &lookup.source))
            .collect();
        if !docs.is_empty() {
            tracing::info!(record_id = %lookup.record_id, "direct lookup supplied document");
        }
        Ok(docs)
    }

    /// Search, and when nothing usable comes back try the direct lookup table once.
    ///
    /// A store error is only returned when the lookup has nothing to offer either.
    pub async fn search_with_fallback(
        &self,
        query_text: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedDocument>, IndexError> {
        let primary = self.try_search(embedding, top_k, filter).await;
        if matches!(&primary, Ok(docs) if !docs.is_empty()) {
            return primary;
        }

        match self.direct_lookup(query_text).await {
            Ok(docs) if !docs.is_empty() => Ok(docs),
            Ok(_) => primary,
            Err(e) => {
                tracing::warn!(error = %e, "direct lookup failed");
                primary
            }
        }
    }

    fn to_document(&self, m: Match) -> Option<RetrievedDocument> {
        let Match {
            id,
            score,
            mut metadata,
        } = m;
        let Some(content) = take_text(&mut metadata, &self.cfg.text_key) else {
            tracing::debug!(id = %id, "match has no text, skipping");
            return None;
        };
        Some(RetrievedDocument {
            content,
            source: self.source_label(&metadata),
            score,
        })
    }

    fn lookup_document(&self, mut rec: Record, source: &str) -> Option<RetrievedDocument> {
        take_text(&mut rec.metadata, &self.cfg.text_key).map(|content| RetrievedDocument {
            content,
            source: source.to_string(),
            score: 1.0,
        })
    }

    /// `"{title} ({url})"`, the title alone, or [`UNKNOWN_SOURCE`].
    pub fn source_label(&self, metadata: &Map<String, Value>) -> String {
        let field = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        match (field(&self.cfg.title_key), field(&self.cfg.url_key)) {
            (Some(title), Some(url)) => format!("{title} ({url})"),
            (Some(title), None) => title.to_string(),
            (None, Some(url)) => url.to_string(),
            (None, None) => UNKNOWN_SOURCE.to_string(),
        }
    }
}

fn take_text(metadata: &mut Map<String, Value>, key: &str) -> Option<String> {
    match metadata.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}
