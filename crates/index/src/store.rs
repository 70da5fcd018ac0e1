use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{IndexError, MetadataFilter};

/// A stored vector with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One nearest-neighbour hit, in store order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    /// Raw similarity as reported by the store. Range and sign are backend-defined.
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Parameters of a similarity query.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    pub vector: &'a [f32],
    pub top_k: usize,
    pub filter: Option<&'a MetadataFilter>,
    pub namespace: Option<&'a str>,
}

impl<'a> QueryRequest<'a> {
    pub fn new(vector: &'a [f32], top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            filter: None,
            namespace: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<&'a MetadataFilter>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }

    pub fn with_namespace(mut self, namespace: Option<&'a str>) -> Self {
        self.namespace = namespace;
        self
    }
}

/// Summary reported by `describe`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub dimension: Option<usize>,
    pub total_vector_count: u64,
    pub index_fullness: f32,
    pub namespaces: Vec<String>,
}

/// Key -> (vector, metadata) store queried by nearest-neighbour similarity.
///
/// Implementations are shared process-wide and must be safe for concurrent use.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Matches ordered by descending score, at most `top_k` of them.
    async fn query(&self, request: QueryRequest<'_>) -> Result<Vec<Match>, IndexError>;

    /// Records for the ids that exist; unknown ids are skipped.
    async fn fetch(&self, ids: &[String], namespace: Option<&str>)
        -> Result<Vec<Record>, IndexError>;

    /// Insert or replace records, returning how many were written.
    async fn upsert(&self, records: Vec<Record>, namespace: Option<&str>)
        -> Result<usize, IndexError>;

    async fn describe(&self) -> Result<IndexStats, IndexError>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_is_dropped_from_request() {
        let v = [0.1f32, 0.2];
        let empty = MetadataFilter::new();
        let req = QueryRequest::new(&v, 3).with_filter(Some(&empty));
        assert!(req.filter.is_none());

        let people = MetadataFilter::new().contains("source_url", "people");
        let req = QueryRequest::new(&v, 3).with_filter(Some(&people));
        assert_eq!(req.filter, Some(&people));
    }

    #[test]
    fn record_builder_sets_metadata() {
        let rec = Record::new("a", vec![1.0]).with_metadata("text", "hello");
        assert_eq!(rec.metadata.get("text"), Some(&json!("hello")));
    }
}
