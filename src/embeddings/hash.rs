use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{EmbeddingProvider, HealthStatus};
use crate::metrics::EMBEDDING_REQUESTS;
use crate::search::scoring::camel_tokens;

/// Deterministic offline embedder.
///
/// Each identifier sub-token is hashed into one signed bucket, so texts that
/// share tokens point in similar directions. Needs no model download.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn text_to_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for word in text.split(|c: char| !c.is_alphanumeric()) {
            for token in camel_tokens(word) {
                let digest = Sha256::digest(token.as_bytes());
                let mut seed = u64::from_le_bytes([
                    digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                    digest[7],
                ]);
                let bucket = (seed % self.dimension as u64) as usize;
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                let sign = if (seed >> 16) & 1 == 0 { 1.0 } else { -1.0 };
                vector[bucket] += sign;
            }
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in vector.iter_mut() {
                *v /= magnitude;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        EMBEDDING_REQUESTS.inc();
        Ok(texts.iter().map(|t| self.text_to_vector(t)).collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &'static str {
        "hash"
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }
}
