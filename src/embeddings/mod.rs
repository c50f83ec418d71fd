//! Text embedding providers

mod fastembed_provider;
mod hash;

pub use fastembed_provider::FastEmbedProvider;
pub use hash::HashEmbedder;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingsConfig};

/// An embedded query together with its dimensionality
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    pub vector: Vec<f32>,
    pub dims: usize,
}

/// Health status for provider monitoring
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { error: String },
}

/// Core trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per text in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate the embedding for a search query
    async fn embed_query(&self, query: &str) -> Result<QueryEmbedding> {
        let vector = self
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding generated for query"))?;
        Ok(QueryEmbedding {
            dims: vector.len(),
            vector,
        })
    }

    fn embedding_dimension(&self) -> usize;

    /// Get provider name for logging and metrics
    fn provider_name(&self) -> &'static str;

    async fn health_check(&self) -> Result<HealthStatus>;
}

/// Build the provider selected in the configuration
pub async fn create_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.backend {
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        EmbeddingBackend::FastEmbed => {
            let config = config.clone();
            // Model loading reads (and may download) weights from disk
            let provider = tokio::task::spawn_blocking(move || FastEmbedProvider::new(&config))
                .await
                .map_err(|e| anyhow!("Embedding model loading task failed: {}", e))??;
            Ok(Arc::new(provider))
        }
    }
}
