//! Error types shared across extraction and search

use thiserror::Error;

/// Failure while turning one parsed file (or one node in it) into symbols.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The parser produced no usable tree for the file.
    #[error("Failed to parse {path} as {language}")]
    Parse { path: String, language: String },

    /// No extractor or grammar is registered for the language tag.
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A node's byte range does not fall on character boundaries of the source.
    #[error("Node range {start}..{end} is not valid UTF-8 in the source")]
    InvalidUtf8 { start: usize, end: usize },

    /// Traversal went deeper than the configured limit.
    #[error("Maximum traversal depth {0} exceeded")]
    DepthLimit(usize),

    /// A declaration node had no identifiable name.
    #[error("Declaration `{node_kind}` has no name")]
    MissingName { node_kind: &'static str },
}

/// Failure surfaced by the hybrid search engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Semantic search was requested before the backend was initialized.
    #[error("Search engine is not initialized; call initialize() first")]
    NotInitialized,

    /// The embedder or vector store could not be brought up.
    #[error("Search engine initialization failed: {0:#}")]
    Initialization(anyhow::Error),

    #[error("Symbol store error: {0:#}")]
    SymbolStore(anyhow::Error),

    #[error("Lexical index error: {0:#}")]
    Lexical(anyhow::Error),

    #[error("Embedding error: {0:#}")]
    Embedding(anyhow::Error),

    #[error("Vector store error: {0:#}")]
    VectorStore(anyhow::Error),
}

impl EngineError {
    /// Whether repeating the call later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::NotInitialized | EngineError::Initialization(_)
        )
    }
}
