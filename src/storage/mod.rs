//! Symbol and vector storage.
//!
//! Both stores replace a file's contents as a whole; nothing is patched.

pub mod lancedb;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::search::layers::{detect_layer, Layer};
use crate::symbol::{Relationship, Symbol, SymbolId};

pub use self::lancedb::LanceVectorStore;
pub use memory::{MemorySymbolStore, MemoryVectorStore};

/// Semantic confidence at which a neighbour counts as the same entity
/// regardless of its name
pub const ENTITY_SEMANTIC_CUTOFF: f32 = 0.9;

/// Suffixes stripped when comparing entity names across layers
const ENTITY_SUFFIXES: &[&str] = &[
    "dto",
    "entity",
    "model",
    "table",
    "schema",
    "record",
    "repository",
    "service",
    "controller",
];

#[async_trait]
pub trait SymbolStore: Send + Sync {
    async fn get_by_id(&self, id: &SymbolId) -> Result<Option<Symbol>>;

    /// Drop everything previously stored for `file_path` and store the new set
    async fn replace_file_symbols(
        &self,
        file_path: &str,
        symbols: Vec<Symbol>,
        relationships: Vec<Relationship>,
    ) -> Result<()>;

    async fn symbols_in_file(&self, file_path: &str) -> Result<Vec<Symbol>>;

    async fn relationships_in_file(&self, file_path: &str) -> Result<Vec<Relationship>>;

    async fn symbol_count(&self) -> Result<usize>;

    async fn file_count(&self) -> Result<usize>;

    /// Every file path with stored symbols or relationships, sorted
    async fn indexed_files(&self) -> Result<Vec<String>>;
}

/// One embedded symbol as stored in a vector store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub symbol_id: SymbolId,
    pub name: String,
    pub kind: String,
    pub file_path: String,
    pub language: String,
    pub vector: Vec<f32>,
}

impl VectorRecord {
    pub fn for_symbol(symbol: &Symbol, vector: Vec<f32>) -> Self {
        Self {
            symbol_id: symbol.id.clone(),
            name: symbol.name.clone(),
            kind: symbol.kind.as_str().to_string(),
            file_path: symbol.file_path.clone(),
            language: symbol.language.clone(),
            vector,
        }
    }
}

/// A nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub symbol_id: SymbolId,
    pub name: String,
    pub file_path: String,
    /// Cosine distance, 0 for identical direction
    pub distance: f32,
    /// Similarity in [0, 1]
    pub confidence: f32,
}

/// A vector hit judged to represent the searched entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityHit {
    pub symbol_id: SymbolId,
    pub name: String,
    pub file_path: String,
    pub layer: Layer,
    pub confidence: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` neighbours with `confidence >= threshold`, best first
    async fn search(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorMatch>>;

    async fn replace_file(&self, file_path: &str, records: Vec<VectorRecord>) -> Result<()>;

    async fn count(&self) -> Result<usize>;

    /// Neighbours of `vector` that name the same entity as `entity_name`,
    /// each labelled with its architectural layer.
    async fn find_cross_layer_entity(
        &self,
        entity_name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<EntityHit>> {
        let matches = self.search(vector, k, 0.0).await?;
        Ok(matches
            .into_iter()
            .filter_map(|m| {
                let relation = name_relation(entity_name, &m.name);
                if relation == 0.0 && m.confidence < ENTITY_SEMANTIC_CUTOFF {
                    return None;
                }
                Some(EntityHit {
                    layer: detect_layer(&m.file_path),
                    confidence: m.confidence.max(relation),
                    symbol_id: m.symbol_id,
                    name: m.name,
                    file_path: m.file_path,
                })
            })
            .collect())
    }
}

/// Reduce a name to the entity it stands for: `IUserDto`, `UserEntity`,
/// and `users` all become `user`.
pub fn entity_stem(name: &str) -> String {
    let mut chars = name.chars();
    let without_prefix = match (chars.next(), chars.next()) {
        (Some('I'), Some(second)) if second.is_ascii_uppercase() => &name[1..],
        _ => name,
    };

    let mut stem = without_prefix.to_lowercase();
    stem.retain(|c| c.is_alphanumeric());
    if let Some(suffix) = ENTITY_SUFFIXES
        .iter()
        .find(|suffix| stem.len() > suffix.len() && stem.ends_with(*suffix))
    {
        stem.truncate(stem.len() - suffix.len());
    }
    if stem.len() > 1 && stem.ends_with('s') && !stem.ends_with("ss") {
        stem.pop();
    }
    stem
}

/// 1.0 when both names reduce to the same stem, 0.8 when one contains the
/// other, 0.0 otherwise
pub fn name_relation(entity_name: &str, candidate: &str) -> f32 {
    let entity = entity_stem(entity_name);
    let other = entity_stem(candidate);
    if entity.is_empty() || other.is_empty() {
        return 0.0;
    }
    if entity == other {
        1.0
    } else if other.contains(&entity) || entity.contains(&other) {
        0.8
    } else {
        0.0
    }
}

/// Cosine similarity; zero vectors are orthogonal to everything
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
