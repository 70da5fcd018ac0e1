use serde::{Deserialize, Serialize};

/// Fixed-length embedding produced by the adapter.
///
/// Its length always equals the adapter's `target_dim`, whatever the backend returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// The well-formed failure value: `dim` zeros.
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub(crate) fn from_adapted(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every component is zero (the adapter's failure marker).
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|x| *x == 0.0)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
