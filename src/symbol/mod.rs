//! Symbol data model
//!
//! Every extractor produces [`Symbol`] and [`Relationship`] records in this shape,
//! and every store and search component consumes them.

pub mod identity;
pub mod types;

pub use identity::{position_at, Position, SymbolId};
pub use types::{
    Relationship, RelationshipKind, Symbol, SymbolKind, SymbolSpan, Visibility,
    RECOVERED_CONFIDENCE, RESOLVED_CONFIDENCE, UNRESOLVED_CONFIDENCE,
};
