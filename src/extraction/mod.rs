//! Symbol extraction framework.
//!
//! One [`LanguageExtractor`] per language turns a parsed file into symbols,
//! relationships, and inferred types. Extractors are stateless: everything a
//! single extraction needs lives in the [`ExtractionContext`] passed in, so one
//! extractor instance serves any number of concurrent files.

pub mod context;
pub mod languages;
pub mod modifiers;
pub mod parser_pool;
pub mod recovery;
pub mod registry;
pub mod resolve;
pub mod walker;

use std::collections::HashMap;

use tree_sitter::Tree;

use crate::symbol::{Relationship, Symbol, SymbolId};

pub use context::{ExtractionContext, ExtractionDiagnostic, NodeKey};
pub use modifiers::{classify_modifiers, ModifierRule, ModifierTable};
pub use parser_pool::ParserPool;
pub use recovery::RecoveryPattern;
pub use registry::ExtractorRegistry;
pub use walker::{NodeVisitor, Scope, Visit};

/// Everything extracted from one file
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    pub symbols: Vec<Symbol>,
    pub relationships: Vec<Relationship>,
    pub types: HashMap<SymbolId, String>,
    pub diagnostics: Vec<ExtractionDiagnostic>,
}

impl FileExtraction {
    pub fn recovered_count(&self) -> usize {
        self.symbols.iter().filter(|s| s.is_recovered()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, ExtractionDiagnostic::NodeSkipped { .. }))
            .count()
    }
}

/// Contract every language module implements.
pub trait LanguageExtractor: Send + Sync {
    /// Language tag this extractor is registered under (e.g. "python").
    fn language_id(&self) -> &'static str;

    /// Produce the file's symbols in one depth-first pass.
    ///
    /// A node that fails to classify is skipped along with its subtree and
    /// recorded in `ctx`; its siblings are still visited.
    fn extract_symbols(&self, tree: &Tree, ctx: &mut ExtractionContext<'_>) -> Vec<Symbol>;

    /// Resolve call, inheritance, import, and containment edges against
    /// `symbols` from the same file.
    fn extract_relationships(
        &self,
        tree: &Tree,
        symbols: &[Symbol],
        ctx: &mut ExtractionContext<'_>,
    ) -> Vec<Relationship>;

    /// Derive a type string per symbol from its metadata alone.
    fn infer_types(&self, symbols: &[Symbol]) -> HashMap<SymbolId, String> {
        infer_types_from_metadata(symbols)
    }

    fn modifier_table(&self) -> &ModifierTable;

    /// Text patterns for the error-region fallback stage
    fn recovery_patterns(&self) -> &[RecoveryPattern] {
        &[]
    }

    /// Run all stages: symbols, recovery, relationships, types.
    fn extract(&self, tree: &Tree, ctx: &mut ExtractionContext<'_>) -> FileExtraction {
        let mut symbols = self.extract_symbols(tree, ctx);
        recovery::recover_error_regions(tree, &mut symbols, self.recovery_patterns(), ctx);
        let relationships = self.extract_relationships(tree, &symbols, ctx);
        let types = self.infer_types(&symbols);

        FileExtraction {
            symbols,
            relationships,
            types,
            diagnostics: ctx.take_diagnostics(),
        }
    }
}

/// `returnType` for callables, `type` for everything that declares one,
/// and the type's own name for type declarations.
pub fn infer_types_from_metadata(symbols: &[Symbol]) -> HashMap<SymbolId, String> {
    let mut types = HashMap::new();
    for symbol in symbols {
        let inferred = if symbol.kind.is_callable() {
            symbol.meta_str("returnType").map(str::to_string)
        } else if symbol.kind.is_type() {
            Some(symbol.name.clone())
        } else {
            symbol.meta_str("type").map(str::to_string)
        };
        if let Some(inferred) = inferred.filter(|t| !t.is_empty()) {
            types.insert(symbol.id.clone(), inferred);
        }
    }
    types
}

/// Collapse runs of whitespace into single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
