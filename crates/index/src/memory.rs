use async_trait::async_trait;
use hashbrown::HashMap;
use std::cmp::Ordering;
use std::sync::RwLock;

use crate::store::{IndexStats, Match, QueryRequest, Record, VectorStore};
use crate::IndexError;

/// Chunk size for the auto-vectorized dot product.
const SIMD_CHUNK_SIZE: usize = 32;

type Namespace = HashMap<String, Record>;

/// Process-local vector store with exact cosine scoring.
///
/// Used for tests, offline runs and small curated corpora. Records live in per-namespace
/// maps; the unnamed namespace is the empty string.
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
    dimension: Option<usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            dimension: None,
        }
    }

    /// Reject writes and queries whose vectors are not exactly `dim` long.
    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = Some(dim);
        self
    }

    pub fn len(&self) -> usize {
        self.namespaces
            .read()
            .map(|guard| guard.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_dimension(&self, got: usize) -> Result<(), IndexError> {
        match self.dimension {
            Some(expected) if expected != got => {
                Err(IndexError::DimensionMismatch { expected, got })
            }
            _ => Ok(()),
        }
    }

    /// Cosine similarity; zero-norm or mismatched vectors score 0.
    #[inline]
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (ca, cb) in a.chunks(SIMD_CHUNK_SIZE).zip(b.chunks(SIMD_CHUNK_SIZE)) {
            for (&x, &y) in ca.iter().zip(cb) {
                dot += x * y;
                norm_a += x * x;
                norm_b += y * y;
            }
        }

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(&self, request: QueryRequest<'_>) -> Result<Vec<Match>, IndexError> {
        if request.top_k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(request.vector.len())?;

        let guard = self
            .namespaces
            .read()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        let Some(records) = guard.get(request.namespace.unwrap_or_default()) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<Match> = records
            .values()
            .filter(|rec| request.filter.is_none_or(|f| f.matches(&rec.metadata)))
            .map(|rec| Match {
                id: rec.id.clone(),
                score: Self::cosine_similarity(request.vector, &rec.values),
                metadata: rec.metadata.clone(),
            })
            .collect();

        // Ties are broken by id so ordering is deterministic.
        results.sort_unstable_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(request.top_k);
        Ok(results)
    }

    async fn fetch(
        &self,
        ids: &[String],
        namespace: Option<&str>,
    ) -> Result<Vec<Record>, IndexError> {
        let guard = self
            .namespaces
            .read()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        let Some(records) = guard.get(namespace.unwrap_or_default()) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn upsert(
        &self,
        records: Vec<Record>,
        namespace: Option<&str>,
    ) -> Result<usize, IndexError> {
        for rec in &records {
            self.check_dimension(rec.values.len())?;
        }

        // A single write lock is held for the whole batch.
        let mut guard = self
            .namespaces
            .write()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        let ns = guard
            .entry(namespace.unwrap_or_default().to_string())
            .or_default();
        let written = records.len();
        for rec in records {
            ns.insert(rec.id.clone(), rec);
        }
        Ok(written)
    }

    async fn describe(&self) -> Result<IndexStats, IndexError> {
        let guard = self
            .namespaces
            .read()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        let mut namespaces: Vec<String> = guard.keys().cloned().collect();
        namespaces.sort();
        Ok(IndexStats {
            dimension: self.dimension,
            total_vector_count: guard.values().map(|ns| ns.len() as u64).sum(),
            index_fullness: 0.0,
            namespaces,
        })
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
