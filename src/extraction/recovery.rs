//! Fallback recovery for broken syntax.
//!
//! Runs after the structured pass. For every outermost `ERROR` region that the
//! structured pass emitted nothing inside, the language's text patterns are
//! matched against the region and each hit becomes a [`Symbol::recovered`].
//! Regions with structured symbols are left alone.

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::symbol::{position_at, Symbol, SymbolId, SymbolKind, SymbolSpan};

use super::context::{ExtractionContext, ExtractionDiagnostic};

/// A text pattern whose first capture group is a symbol name
#[derive(Debug)]
pub struct RecoveryPattern {
    pub regex: Regex,
    pub kind: SymbolKind,
}

impl RecoveryPattern {
    /// Build a pattern from a literal regex.
    ///
    /// Patterns are compile-time constants; an invalid one is a programming error.
    pub fn new(pattern: &str, kind: SymbolKind) -> Self {
        Self {
            regex: Regex::new(pattern).expect("recovery pattern must be a valid regex"),
            kind,
        }
    }
}

/// Words that the name capture of a pattern must never produce
const RESERVED_NAMES: &[&str] = &[
    "if", "else", "for", "while", "return", "switch", "case", "do", "class", "struct", "def",
    "enum", "namespace", "public", "private", "protected", "template", "typename",
];

/// Append recovered symbols for error regions with no structured symbols.
///
/// Returns the number of symbols added. The list stays sorted by start byte.
pub fn recover_error_regions(
    tree: &Tree,
    symbols: &mut Vec<Symbol>,
    patterns: &[RecoveryPattern],
    ctx: &mut ExtractionContext<'_>,
) -> usize {
    if patterns.is_empty() || !tree.root_node().has_error() {
        return 0;
    }

    let mut regions = Vec::new();
    collect_error_regions(tree.root_node(), &mut regions);

    let mut seen: HashSet<SymbolId> = symbols.iter().map(|s| s.id.clone()).collect();
    let mut recovered = Vec::new();

    for region in regions {
        let (start, end) = (region.start_byte(), region.end_byte());
        let covered = symbols
            .iter()
            .any(|s| !s.is_recovered() && s.start_byte >= start && s.start_byte < end);
        if covered {
            continue;
        }

        let Ok(text) = ctx.slice(start, end) else {
            continue;
        };

        for candidate in recover_in_text(text, start, patterns) {
            let span = SymbolSpan {
                start: position_at(ctx.source(), candidate.start_byte),
                end: position_at(ctx.source(), candidate.end_byte),
                start_byte: candidate.start_byte,
                end_byte: candidate.end_byte,
            };
            let parent = innermost_container(symbols, candidate.start_byte, candidate.end_byte);
            let symbol = Symbol::recovered(
                candidate.name,
                candidate.kind,
                ctx.language().to_string(),
                ctx.file_path().to_string(),
                span,
                parent,
            );
            if !seen.insert(symbol.id.clone()) {
                continue;
            }

            debug!(
                file = ctx.file_path(),
                name = %symbol.name,
                line = symbol.start_line,
                "Recovered symbol from error region"
            );
            ctx.record(ExtractionDiagnostic::RecoveredFromError {
                symbol_id: symbol.id.clone(),
                name: symbol.name.clone(),
                line: symbol.start_line,
            });
            recovered.push(symbol);
        }
    }

    let added = recovered.len();
    if added > 0 {
        symbols.extend(recovered);
        symbols.sort_by_key(|s| s.start_byte);
    }
    added
}

/// A pattern hit inside a region, in absolute byte offsets
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredCandidate {
    pub name: String,
    pub kind: SymbolKind,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// Match every pattern against `text`, which starts at `base_offset` in the file.
pub fn recover_in_text(
    text: &str,
    base_offset: usize,
    patterns: &[RecoveryPattern],
) -> Vec<RecoveredCandidate> {
    let mut candidates = Vec::new();
    for pattern in patterns {
        for captures in pattern.regex.captures_iter(text) {
            let Some(name) = captures.get(1) else {
                continue;
            };
            if RESERVED_NAMES.contains(&name.as_str()) {
                continue;
            }
            candidates.push(RecoveredCandidate {
                name: name.as_str().to_string(),
                kind: pattern.kind,
                start_byte: base_offset + name.start(),
                end_byte: base_offset + name.end(),
            });
        }
    }
    candidates.sort_by_key(|c| c.start_byte);
    candidates
}

fn collect_error_regions<'t>(node: Node<'t>, regions: &mut Vec<Node<'t>>) {
    if node.is_error() {
        regions.push(node);
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_regions(child, regions);
    }
}

fn innermost_container(symbols: &[Symbol], start: usize, end: usize) -> Option<SymbolId> {
    symbols
        .iter()
        .filter(|s| {
            s.kind.is_container()
                && s.start_byte <= start
                && end <= s.end_byte
                && (s.start_byte, s.end_byte) != (start, end)
        })
        .min_by_key(|s| s.end_byte - s.start_byte)
        .map(|s| s.id.clone())
}
