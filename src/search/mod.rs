//! Hybrid symbol search.
//!
//! This module contains:
//! - `traits` - the `LexicalIndex` trait consumed by the engine
//! - `lexical` - tantivy implementation of `LexicalIndex`
//! - `scoring` - name and structure sub-scores
//! - `layers` - architectural layer heuristics
//! - `hybrid` - the engine merging lexical and semantic candidates

pub mod hybrid;
pub mod layers;
pub mod lexical;
pub mod scoring;
pub mod traits;

pub use hybrid::{
    CrossLayerResult, HybridSearchEngine, LayerMatch, RankedResult, SearchMethod, SearchOptions,
    SemanticBackend, SemanticBackendFactory,
};
pub use layers::{detect_layer, Layer};
pub use lexical::TantivySymbolIndex;
pub use traits::{LexicalHit, LexicalIndex};
