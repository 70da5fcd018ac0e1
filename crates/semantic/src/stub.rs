use async_trait::async_trait;
use fxhash::hash64;

use crate::backend::EmbeddingBackend;
use crate::SemanticError;

/// Deterministic local backend used in `"fast"` mode and in tests.
///
/// Values are sinusoids seeded from a hash of the text, so identical text always yields an
/// identical vector and no model files or network access are needed.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl EmbeddingBackend for HashEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        Ok(hash_vector(text, self.dim))
    }

    fn name(&self) -> &str {
        "fast"
    }
}

fn hash_vector(text: &str, dim: usize) -> Vec<f32> {
    let h = hash64(text.as_bytes());
    (0..dim)
        .map(|idx| {
            let mixed = h.rotate_left((idx % 64) as u32) ^ (idx as u64).wrapping_mul(0x9E37_79B9);
            ((mixed >> 40) as f32 * 0.0001).sin()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_native_dimension() {
        let backend = HashEmbedder::new(384);
        let v = backend.encode("hello world").await.unwrap();
        assert_eq!(v.len(), 384);
    }

    #[tokio::test]
    async fn same_text_same_vector() {
        let backend = HashEmbedder::new(64);
        let a = backend.encode("trash collection").await.unwrap();
        let b = backend.encode("trash collection").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_different_vector() {
        let backend = HashEmbedder::new(64);
        let a = backend.encode("water bill").await.unwrap();
        let b = backend.encode("property tax").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn values_stay_in_unit_range() {
        let v = HashEmbedder::new(256).encode("Hello 世界").await.unwrap();
        assert!(v.iter().all(|x| (-1.0..=1.0).contains(x)));
        assert!(!v.iter().all(|x| *x == 0.0));
    }
}
