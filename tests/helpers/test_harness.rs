use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use codesift::config::IndexerConfig;
use codesift::embeddings::{EmbeddingProvider, HashEmbedder};
use codesift::indexer::{IndexReport, Indexer};
use codesift::search::{HybridSearchEngine, SemanticBackend, TantivySymbolIndex};
use codesift::storage::{MemorySymbolStore, MemoryVectorStore};

pub const TEST_DIMENSION: usize = 256;

/// A temp project with in-memory stores and the offline hash embedder
pub struct TestHarness {
    pub temp_dir: TempDir,
    pub symbols: Arc<MemorySymbolStore>,
    pub lexical: Arc<TantivySymbolIndex>,
    pub vectors: Arc<MemoryVectorStore>,
    pub embedder: Arc<HashEmbedder>,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            symbols: Arc::new(MemorySymbolStore::new()),
            lexical: Arc::new(TantivySymbolIndex::in_memory()?),
            vectors: Arc::new(MemoryVectorStore::new()),
            embedder: Arc::new(HashEmbedder::new(TEST_DIMENSION)),
        })
    }

    pub fn create_test_file(&self, path: &str, content: &str) -> Result<PathBuf> {
        let file_path = self.temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, content)?;
        Ok(file_path)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn backend(&self) -> SemanticBackend {
        SemanticBackend {
            embedder: self.embedder.clone(),
            vectors: self.vectors.clone(),
        }
    }

    /// Index the whole temp project into all three stores
    pub async fn index(&self) -> Result<IndexReport> {
        Indexer::new(
            IndexerConfig::default(),
            self.symbols.clone(),
            self.lexical.clone(),
        )
        .with_semantic(self.backend(), 8)
        .index_directory(self.path())
        .await
    }

    pub fn engine(&self) -> HybridSearchEngine {
        HybridSearchEngine::new(
            self.lexical.clone(),
            self.symbols.clone(),
            Arc::new(self.backend()),
        )
    }

    /// Engine over the same stores but with a different embedder
    pub fn engine_with_embedder(&self, embedder: Arc<dyn EmbeddingProvider>) -> HybridSearchEngine {
        let backend = SemanticBackend {
            embedder,
            vectors: self.vectors.clone(),
        };
        HybridSearchEngine::new(self.lexical.clone(), self.symbols.clone(), Arc::new(backend))
    }
}
