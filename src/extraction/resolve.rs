//! Same-file name resolution for relationship passes.

use std::collections::HashMap;

use crate::symbol::{Relationship, RelationshipKind, Symbol};

use super::context::{ExtractionContext, ExtractionDiagnostic};

/// Name and position index over the symbols of one file
pub struct SymbolLookup<'a> {
    symbols: &'a [Symbol],
    by_name: HashMap<&'a str, Vec<&'a Symbol>>,
}

impl<'a> SymbolLookup<'a> {
    pub fn new(symbols: &'a [Symbol]) -> Self {
        let mut by_name: HashMap<&'a str, Vec<&'a Symbol>> = HashMap::new();
        for symbol in symbols {
            by_name.entry(symbol.name.as_str()).or_default().push(symbol);
        }
        Self { symbols, by_name }
    }

    /// First symbol (in document order) with `name` that satisfies `accept`
    pub fn find(&self, name: &str, accept: impl Fn(&Symbol) -> bool) -> Option<&'a Symbol> {
        self.by_name
            .get(name)
            .and_then(|candidates| candidates.iter().copied().find(|s| accept(*s)))
    }

    /// Smallest symbol accepted by `accept` whose range contains `byte`
    pub fn innermost_at(&self, byte: usize, accept: impl Fn(&Symbol) -> bool) -> Option<&'a Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.start_byte <= byte && byte < s.end_byte && accept(*s))
            .min_by_key(|s| s.end_byte - s.start_byte)
    }
}

/// Build an edge from `from` to the symbol named `target`, or to a placeholder
/// when no accepted symbol has that name.
pub fn link(
    lookup: &SymbolLookup<'_>,
    from: &Symbol,
    target: &str,
    kind: RelationshipKind,
    line: usize,
    accept: impl Fn(&Symbol) -> bool,
    ctx: &mut ExtractionContext<'_>,
) -> Relationship {
    match lookup.find(target, accept) {
        Some(to) => Relationship::resolved(from, to, kind, line),
        None => {
            ctx.record(ExtractionDiagnostic::UnresolvedTarget {
                from: from.id.clone(),
                target: target.to_string(),
                kind,
                line,
            });
            Relationship::unresolved(from, target, kind, line)
        }
    }
}

/// One `Contains` edge per parent/child pair
pub fn containment_edges(symbols: &[Symbol]) -> Vec<Relationship> {
    let by_id: HashMap<_, _> = symbols.iter().map(|s| (&s.id, s)).collect();
    symbols
        .iter()
        .filter_map(|child| {
            let parent = by_id.get(child.parent_id.as_ref()?)?;
            Some(Relationship::resolved(
                parent,
                child,
                RelationshipKind::Contains,
                child.start_line,
            ))
        })
        .collect()
}
