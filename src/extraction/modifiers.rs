//! Table-driven modifier classification.
//!
//! Each language declares which grammar node kinds (or keyword texts inside
//! wrapper nodes such as `storage_class_specifier`) stand for which modifier.
//! One classifier walks a declaration's direct children and applies the table.

use std::collections::BTreeSet;

use serde_json::Value;
use tree_sitter::Node;

use crate::symbol::Symbol;

/// A single mapping from a node kind or keyword to a modifier name
#[derive(Debug, Clone, Copy)]
pub struct ModifierRule {
    /// Grammar node kind, or keyword text when the node is a wrapper kind
    pub token: &'static str,
    pub modifier: &'static str,
}

/// Per-language modifier table
#[derive(Debug, Clone)]
pub struct ModifierTable {
    rules: &'static [ModifierRule],
    /// Node kinds whose text is the keyword to look up (e.g. `storage_class_specifier`)
    wrapper_kinds: &'static [&'static str],
}

impl ModifierTable {
    pub const fn new(
        rules: &'static [ModifierRule],
        wrapper_kinds: &'static [&'static str],
    ) -> Self {
        Self {
            rules,
            wrapper_kinds,
        }
    }

    pub const fn empty() -> Self {
        Self {
            rules: &[],
            wrapper_kinds: &[],
        }
    }

    pub fn lookup(&self, token: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.token == token)
            .map(|rule| rule.modifier)
    }

    fn is_wrapper(&self, kind: &str) -> bool {
        self.wrapper_kinds.contains(&kind)
    }
}

/// Collect the modifiers on a declaration node's direct children.
///
/// Returned in sorted order so that the same declaration always yields the
/// same list.
pub fn classify_modifiers(table: &ModifierTable, node: &Node, source: &str) -> Vec<String> {
    let mut found = BTreeSet::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let modifier = if table.is_wrapper(child.kind()) {
            source
                .get(child.start_byte()..child.end_byte())
                .and_then(|text| table.lookup(text.trim()))
        } else {
            table.lookup(child.kind())
        };
        if let Some(modifier) = modifier {
            found.insert(modifier.to_string());
        }
    }
    found.into_iter().collect()
}

/// Metadata flag name for a modifier: `static` becomes `isStatic`
pub fn flag_name(modifier: &str) -> String {
    let mut chars = modifier.chars();
    match chars.next() {
        Some(first) => format!("is{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Store modifiers on a symbol as a `modifiers` list plus one `isX` flag each
pub fn apply_modifiers(symbol: &mut Symbol, modifiers: &[String]) {
    if modifiers.is_empty() {
        return;
    }
    for modifier in modifiers {
        symbol.set_meta(&flag_name(modifier), true);
    }
    symbol.set_meta(
        "modifiers",
        Value::Array(modifiers.iter().cloned().map(Value::String).collect()),
    );
}
