use anyhow::{bail, Result};
use async_trait::async_trait;
use codesift::embeddings::{EmbeddingProvider, HealthStatus};

/// Embedder whose every call fails, as when a model server goes away
pub struct FailingEmbedder {
    dimension: usize,
}

impl FailingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding model unavailable")
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        bail!("embedding model unavailable")
    }
}
