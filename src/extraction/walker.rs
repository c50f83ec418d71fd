//! Single-pass depth-first symbol traversal.
//!
//! The walker owns the scope stack. A language only decides, node by node,
//! what a node means through [`NodeVisitor::visit`]; the walker attaches each
//! emitted symbol to the nearest enclosing scope that strictly contains it and
//! keeps going when one node fails.

use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::error::ExtractionError;
use crate::symbol::{Symbol, SymbolId, SymbolKind};

use super::context::ExtractionContext;

/// An enclosing symbol as seen by nodes below it
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: SymbolId,
    pub kind: SymbolKind,
    pub name: String,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Scope {
    fn of(symbol: &Symbol) -> Self {
        Self {
            id: symbol.id.clone(),
            kind: symbol.kind,
            name: symbol.name.clone(),
            start_byte: symbol.start_byte,
            end_byte: symbol.end_byte,
        }
    }

    fn strictly_contains(&self, symbol: &Symbol) -> bool {
        self.start_byte <= symbol.start_byte
            && symbol.end_byte <= self.end_byte
            && (self.start_byte, self.end_byte) != (symbol.start_byte, symbol.end_byte)
    }

    pub fn is_type(&self) -> bool {
        self.kind.is_type()
    }

    pub fn is_callable(&self) -> bool {
        self.kind.is_callable()
    }
}

/// What a visitor decided about one node
#[derive(Debug)]
pub enum Visit {
    /// Nothing here; visit the children
    Continue,
    /// Nothing here or below
    Prune,
    /// Emit a symbol that encloses everything below this node
    Open(Symbol),
    /// Emit symbols without opening a scope; children are still visited
    Emit(Vec<Symbol>),
}

pub trait NodeVisitor {
    /// Classify one node. `scope` is the innermost open scope, if any.
    fn visit(
        &self,
        node: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError>;
}

/// Run one traversal of `tree` and return the emitted symbols in document order.
///
/// Clears the context's processed-node set first.
pub fn walk_symbols<V>(visitor: &V, tree: &Tree, ctx: &mut ExtractionContext<'_>) -> Vec<Symbol>
where
    V: NodeVisitor + ?Sized,
{
    ctx.begin_pass();
    let mut walk = Walk {
        visitor,
        scopes: Vec::new(),
        symbols: Vec::new(),
    };
    walk.visit_node(tree.root_node(), 0, ctx);
    walk.symbols
}

struct Walk<'v, V: ?Sized> {
    visitor: &'v V,
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl<V: NodeVisitor + ?Sized> Walk<'_, V> {
    fn visit_node(&mut self, node: Node<'_>, depth: usize, ctx: &mut ExtractionContext<'_>) {
        if depth > ctx.max_depth() {
            let err = ExtractionError::DepthLimit(ctx.max_depth());
            debug!(
                file = ctx.file_path(),
                node_kind = node.kind(),
                line = node.start_position().row + 1,
                "Skipping subtree: {}",
                err
            );
            ctx.record_skipped(&node, &err);
            return;
        }

        let outcome = match self.visitor.visit(node, self.scopes.last(), ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(
                    file = ctx.file_path(),
                    node_kind = node.kind(),
                    line = node.start_position().row + 1,
                    "Skipping subtree: {}",
                    err
                );
                ctx.record_skipped(&node, &err);
                return;
            }
        };

        let mut opened = false;
        match outcome {
            Visit::Prune => return,
            Visit::Continue => {}
            Visit::Open(mut symbol) => {
                symbol.parent_id = self.enclosing(&symbol);
                self.scopes.push(Scope::of(&symbol));
                self.symbols.push(symbol);
                opened = true;
            }
            Visit::Emit(symbols) => {
                for mut symbol in symbols {
                    symbol.parent_id = self.enclosing(&symbol);
                    self.symbols.push(symbol);
                }
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            self.visit_node(child, depth + 1, ctx);
        }

        if opened {
            self.scopes.pop();
        }
    }

    /// Nearest open scope whose byte range strictly contains `symbol`
    fn enclosing(&self, symbol: &Symbol) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.strictly_contains(symbol))
            .map(|scope| scope.id.clone())
    }
}
