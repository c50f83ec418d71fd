use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::{EmbeddingProvider, HealthStatus};
use crate::config::EmbeddingsConfig;
use crate::metrics::{EMBEDDING_LATENCY, EMBEDDING_REQUESTS};

/// Local ONNX embedding model
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    batch_size: usize,
}

impl FastEmbedProvider {
    /// Load the configured model. Blocks while weights are read or downloaded.
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let model_type = Self::parse_model_name(&config.model);

        info!("Loading embedding model: {}", config.model);

        let mut options = InitOptions::new(model_type).with_show_download_progress(true);
        if let Some(cache_dir) = &config.cache_dir {
            options = options.with_cache_dir(cache_dir.clone());
        }

        let model = TextEmbedding::try_new(options)
            .with_context(|| format!("Failed to initialize embedding model: {}", config.model))?;

        info!("Embedding model loaded successfully");

        Ok(Self {
            model: Arc::new(model),
            model_name: config.model.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    fn parse_model_name(name: &str) -> EmbeddingModel {
        match name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
            "bge-small-en-v1.5" | "bge-small" | "BAAI/bge-small-en-v1.5" => {
                EmbeddingModel::BGESmallENV15
            }
            "bge-base-en-v1.5" | "bge-base" | "BAAI/bge-base-en-v1.5" => {
                EmbeddingModel::BGEBaseENV15
            }
            "nomic-embed-text-v1.5" | "nomic-embed-text" | "nomic-ai/nomic-embed-text-v1.5" => {
                EmbeddingModel::NomicEmbedTextV15
            }
            _ => {
                warn!("Unknown model '{}', falling back to bge-small-en-v1.5", name);
                EmbeddingModel::BGESmallENV15
            }
        }
    }

    fn model_dimension(model_name: &str) -> usize {
        match model_name {
            name if name.contains("bge-base") || name.contains("nomic") => 768,
            _ => 384,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        EMBEDDING_REQUESTS.inc();
        let start = Instant::now();

        let model = self.model.clone();
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        let embeddings = tokio::task::spawn_blocking(move || {
            let mut embeddings = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(batch_size) {
                let batch: Vec<&str> = chunk.iter().map(|s| s.as_str()).collect();
                let batch_embeddings = model
                    .embed(batch, None)
                    .context("Failed to generate embeddings")?;
                embeddings.extend(batch_embeddings);
            }
            Ok::<Vec<Vec<f32>>, anyhow::Error>(embeddings)
        })
        .await
        .context("FastEmbed processing task failed")??;

        EMBEDDING_LATENCY.observe(start.elapsed().as_secs_f64());
        Ok(embeddings)
    }

    fn embedding_dimension(&self) -> usize {
        Self::model_dimension(&self.model_name)
    }

    fn provider_name(&self) -> &'static str {
        "fastembed"
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        match self.embed(&["health check".to_string()]).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy {
                error: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_name() {
        assert!(matches!(
            FastEmbedProvider::parse_model_name("all-MiniLM-L6-v2"),
            EmbeddingModel::AllMiniLML6V2
        ));
        assert!(matches!(
            FastEmbedProvider::parse_model_name("BAAI/bge-base-en-v1.5"),
            EmbeddingModel::BGEBaseENV15
        ));
        assert!(matches!(
            FastEmbedProvider::parse_model_name("unknown-model"),
            EmbeddingModel::BGESmallENV15
        ));
    }

    #[test]
    fn test_model_dimension() {
        assert_eq!(FastEmbedProvider::model_dimension("bge-small-en-v1.5"), 384);
        assert_eq!(FastEmbedProvider::model_dimension("bge-base-en-v1.5"), 768);
        assert_eq!(FastEmbedProvider::model_dimension("nomic-embed-text-v1.5"), 768);
        assert_eq!(FastEmbedProvider::model_dimension("all-MiniLM-L6-v2"), 384);
    }

    #[tokio::test]
    #[ignore] // Requires model download
    async fn test_embed_query() {
        let config = EmbeddingsConfig {
            model: "all-MiniLM-L6-v2".to_string(),
            ..Default::default()
        };
        let provider = FastEmbedProvider::new(&config).unwrap();

        let embedding = provider.embed_query("parse configuration file").await.unwrap();
        assert_eq!(embedding.dims, 384);
    }
}
