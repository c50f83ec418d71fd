//! Lexical index trait consumed by the hybrid engine.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::symbol::{Symbol, SymbolId, SymbolKind};

/// A symbol found by name matching.
///
/// Carries enough of the symbol to score it without a store lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalHit {
    pub symbol_id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub language: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
    /// Raw score from the pass that produced the hit
    pub score: f32,
}

impl LexicalHit {
    pub fn line_span(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Name-oriented index over extracted symbols.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    /// Typo-tolerant matching over names, name sub-tokens, signatures, and docs.
    /// Results are sorted by score, highest first.
    async fn search_fuzzy(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>>;

    /// Whole-name matches only, case-insensitive.
    async fn search_exact(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>>;

    /// Drop everything indexed for `file_path` and index `symbols` in its place.
    /// Changes become visible after [`LexicalIndex::commit`].
    async fn replace_file(&self, file_path: &str, symbols: &[Symbol]) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    /// Get the index type identifier, such as "tantivy"
    fn index_type(&self) -> &'static str;
}
