//! Stores and engine wiring shared by the commands.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, EmbeddingsConfig};
use crate::embeddings::create_provider;
use crate::search::{HybridSearchEngine, SemanticBackend, SemanticBackendFactory, TantivySymbolIndex};
use crate::storage::{LanceVectorStore, MemorySymbolStore};

/// Builds the embedder and LanceDB store described by the configuration
pub struct ConfigBackendFactory {
    embeddings: EmbeddingsConfig,
    vectors_path: PathBuf,
}

impl ConfigBackendFactory {
    pub fn new(embeddings: EmbeddingsConfig, vectors_path: PathBuf) -> Self {
        Self {
            embeddings,
            vectors_path,
        }
    }
}

#[async_trait]
impl SemanticBackendFactory for ConfigBackendFactory {
    async fn create(&self) -> Result<SemanticBackend> {
        let embedder = create_provider(&self.embeddings).await?;
        let vectors = LanceVectorStore::new(&self.vectors_path, embedder.embedding_dimension())
            .await
            .with_context(|| {
                format!("Failed to open vector store at {}", self.vectors_path.display())
            })?;
        Ok(SemanticBackend {
            embedder,
            vectors: Arc::new(vectors),
        })
    }
}

/// A project root with its configuration and opened local stores
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub symbols: Arc<MemorySymbolStore>,
    pub lexical: Arc<TantivySymbolIndex>,
}

impl Workspace {
    pub fn open(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", root.display()))?;
        let config = Config::load(&root)?;

        let symbols = MemorySymbolStore::load(&config.symbols_path(&root))?;
        let lexical = TantivySymbolIndex::open(&config.lexical_path(&root))?;

        Ok(Self {
            root,
            config,
            symbols: Arc::new(symbols),
            lexical: Arc::new(lexical),
        })
    }

    pub fn backend_factory(&self) -> ConfigBackendFactory {
        ConfigBackendFactory::new(
            self.config.embeddings.clone(),
            self.config.vectors_path(&self.root),
        )
    }

    pub fn engine(&self) -> HybridSearchEngine {
        HybridSearchEngine::new(
            self.lexical.clone(),
            self.symbols.clone(),
            Arc::new(self.backend_factory()),
        )
        .with_lazy_init(self.config.search.lazy_init)
    }

    /// Write the symbol store snapshot
    pub fn persist(&self) -> Result<()> {
        self.symbols.persist(&self.config.symbols_path(&self.root))
    }
}
