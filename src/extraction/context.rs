//! Per-call traversal state.
//!
//! An [`ExtractionContext`] is created for one file and threaded through every
//! stage of one extraction. It owns the processed-node set used to suppress
//! double emission from wrapper nodes, and the diagnostics gathered on the way.
//! Nothing in it outlives the call or is shared between files.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::error::ExtractionError;
use crate::symbol::{RelationshipKind, SymbolId};

/// Default limit on syntax-tree nesting visited by the walker
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Identity of a syntax node inside one file: `(start_byte, end_byte, kind)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub start_byte: usize,
    pub end_byte: usize,
    pub kind: &'static str,
}

impl NodeKey {
    pub fn of(node: &Node) -> Self {
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            kind: node.kind(),
        }
    }
}

/// Something worth reporting about an extraction that did not stop it
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionDiagnostic {
    /// A subtree was dropped because visiting it failed
    NodeSkipped {
        node_kind: String,
        start_byte: usize,
        end_byte: usize,
        line: usize,
        reason: String,
    },
    /// A symbol came from text-pattern recovery inside an error region
    RecoveredFromError {
        symbol_id: SymbolId,
        name: String,
        line: usize,
    },
    /// A relationship points at a placeholder target
    UnresolvedTarget {
        from: SymbolId,
        target: String,
        kind: RelationshipKind,
        line: usize,
    },
}

pub struct ExtractionContext<'s> {
    file_path: String,
    language: String,
    source: &'s str,
    processed: HashSet<NodeKey>,
    diagnostics: Vec<ExtractionDiagnostic>,
    max_depth: usize,
}

impl<'s> ExtractionContext<'s> {
    pub fn new(file_path: impl Into<String>, language: impl Into<String>, source: &'s str) -> Self {
        Self {
            file_path: file_path.into(),
            language: language.into(),
            source,
            processed: HashSet::new(),
            diagnostics: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Reset per-pass state. Called at the start of every symbol pass.
    pub fn begin_pass(&mut self) {
        self.processed.clear();
    }

    /// Record that `node` has already produced its symbol through another path
    pub fn mark_processed(&mut self, node: &Node) {
        self.processed.insert(NodeKey::of(node));
    }

    pub fn is_processed(&self, node: &Node) -> bool {
        self.processed.contains(&NodeKey::of(node))
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Source text of a node
    pub fn text(&self, node: &Node) -> Result<&'s str, ExtractionError> {
        self.slice(node.start_byte(), node.end_byte())
    }

    pub fn slice(&self, start: usize, end: usize) -> Result<&'s str, ExtractionError> {
        self.source
            .get(start..end)
            .ok_or(ExtractionError::InvalidUtf8 { start, end })
    }

    pub fn record(&mut self, diagnostic: ExtractionDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn record_skipped(&mut self, node: &Node, error: &ExtractionError) {
        self.diagnostics.push(ExtractionDiagnostic::NodeSkipped {
            node_kind: node.kind().to_string(),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            line: node.start_position().row + 1,
            reason: error.to_string(),
        });
    }

    pub fn diagnostics(&self) -> &[ExtractionDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<ExtractionDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
