//! Python extractor.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_json::Value;
use tree_sitter::{Node, Tree};

use crate::error::ExtractionError;
use crate::extraction::modifiers::{apply_modifiers, classify_modifiers, ModifierRule, ModifierTable};
use crate::extraction::recovery::RecoveryPattern;
use crate::extraction::resolve::{containment_edges, link, SymbolLookup};
use crate::extraction::walker::{walk_symbols, NodeVisitor, Scope, Visit};
use crate::extraction::{collapse_whitespace, infer_types_from_metadata, ExtractionContext, LanguageExtractor};
use crate::symbol::{Relationship, RelationshipKind, Symbol, SymbolId, SymbolKind, SymbolSpan, Visibility};

/// Keyword tokens and decorator names (last dotted segment) mapped to modifiers
static PYTHON_MODIFIERS: &[ModifierRule] = &[
    ModifierRule { token: "async", modifier: "async" },
    ModifierRule { token: "staticmethod", modifier: "static" },
    ModifierRule { token: "classmethod", modifier: "classmethod" },
    ModifierRule { token: "abstractmethod", modifier: "abstract" },
    ModifierRule { token: "property", modifier: "property" },
    ModifierRule { token: "cached_property", modifier: "property" },
    ModifierRule { token: "setter", modifier: "property" },
    ModifierRule { token: "getter", modifier: "property" },
    ModifierRule { token: "deleter", modifier: "property" },
    ModifierRule { token: "dataclass", modifier: "dataclass" },
    ModifierRule { token: "overload", modifier: "overload" },
];

static PYTHON_TABLE: ModifierTable = ModifierTable::new(PYTHON_MODIFIERS, &[]);

lazy_static! {
    static ref PYTHON_RECOVERY: Vec<RecoveryPattern> = vec![
        RecoveryPattern::new(r"\bclass\s+([A-Za-z_]\w*)", SymbolKind::Class),
        RecoveryPattern::new(r"\bdef\s+([A-Za-z_]\w*)", SymbolKind::Function),
    ];
}

pub struct PythonExtractor;

impl PythonExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for PythonExtractor {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn extract_symbols(&self, tree: &Tree, ctx: &mut ExtractionContext<'_>) -> Vec<Symbol> {
        walk_symbols(self, tree, ctx)
    }

    fn extract_relationships(
        &self,
        tree: &Tree,
        symbols: &[Symbol],
        ctx: &mut ExtractionContext<'_>,
    ) -> Vec<Relationship> {
        let lookup = SymbolLookup::new(symbols);
        let mut relationships = containment_edges(symbols);

        for class in symbols.iter().filter(|s| s.kind == SymbolKind::Class) {
            let bases: Vec<String> = class
                .metadata
                .get("baseClasses")
                .and_then(Value::as_array)
                .map(|bases| bases.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            for base in bases {
                relationships.push(link(
                    &lookup,
                    class,
                    &base,
                    RelationshipKind::Extends,
                    class.start_line,
                    |s| s.kind.is_type(),
                    ctx,
                ));
            }
        }

        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "call" {
                if let Some(edge) = call_edge(node, &lookup, ctx) {
                    relationships.push(edge);
                }
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        for import in symbols.iter().filter(|s| s.kind == SymbolKind::Import) {
            let module = import.meta_str("module").unwrap_or(&import.name).to_string();
            relationships.push(link(
                &lookup,
                import,
                &module,
                RelationshipKind::Imports,
                import.start_line,
                |_| false,
                ctx,
            ));
        }

        relationships
    }

    /// Declared annotations first, then the kind of literal a variable was bound to.
    fn infer_types(&self, symbols: &[Symbol]) -> HashMap<SymbolId, String> {
        let mut types = infer_types_from_metadata(symbols);
        for symbol in symbols {
            if types.contains_key(&symbol.id) {
                continue;
            }
            if let Some(value_kind) = symbol.meta_str("valueKind") {
                types.insert(symbol.id.clone(), value_kind.to_string());
            }
        }
        types
    }

    fn modifier_table(&self) -> &ModifierTable {
        &PYTHON_TABLE
    }

    fn recovery_patterns(&self) -> &[RecoveryPattern] {
        PYTHON_RECOVERY.as_slice()
    }
}

impl NodeVisitor for PythonExtractor {
    fn visit(
        &self,
        node: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        if ctx.is_processed(&node) {
            return Ok(Visit::Continue);
        }

        match node.kind() {
            "decorated_definition" => self.decorated(node, scope, ctx),
            "function_definition" => self.function(node, node, &[], scope, ctx).map(Visit::Open),
            "class_definition" => self.class(node, node, &[], ctx).map(Visit::Open),
            "assignment" => self.assignment(node, scope, ctx),
            "import_statement" | "import_from_statement" => self.import(node, ctx),
            _ => Ok(Visit::Continue),
        }
    }
}

impl PythonExtractor {
    fn symbol(
        &self,
        name: &str,
        kind: SymbolKind,
        anchor: &Node,
        ctx: &ExtractionContext<'_>,
    ) -> Symbol {
        Symbol::new(
            name,
            kind,
            ctx.language(),
            ctx.file_path(),
            SymbolSpan::of_node(anchor),
            python_visibility(name),
        )
    }

    /// The wrapper carries the decorators; the inner definition is marked so
    /// it is not emitted a second time.
    fn decorated(
        &self,
        node: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        let Some(definition) = node.child_by_field_name("definition") else {
            return Ok(Visit::Continue);
        };

        let mut decorators = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                let text = ctx.text(&child)?.trim_start_matches('@').trim();
                let name = text.split('(').next().unwrap_or(text).trim();
                decorators.push(name.to_string());
            }
        }

        let symbol = match definition.kind() {
            "function_definition" => self.function(node, definition, &decorators, scope, ctx)?,
            "class_definition" => self.class(node, definition, &decorators, ctx)?,
            _ => return Ok(Visit::Continue),
        };
        ctx.mark_processed(&definition);
        Ok(Visit::Open(symbol))
    }

    fn function(
        &self,
        anchor: Node<'_>,
        def: Node<'_>,
        decorators: &[String],
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Symbol, ExtractionError> {
        let name_node = def
            .child_by_field_name("name")
            .ok_or(ExtractionError::MissingName { node_kind: def.kind() })?;
        let name = ctx.text(&name_node)?;

        let mut modifiers = classify_modifiers(&PYTHON_TABLE, &def, ctx.source());
        modifiers.extend(decorator_modifiers(decorators));
        modifiers.sort();
        modifiers.dedup();

        let in_class = scope.is_some_and(|s| s.kind == SymbolKind::Class);
        let kind = if !in_class {
            SymbolKind::Function
        } else if name == "__init__" {
            SymbolKind::Constructor
        } else if modifiers.iter().any(|m| m == "property") {
            SymbolKind::Property
        } else {
            SymbolKind::Method
        };

        let mut signature = String::new();
        if modifiers.iter().any(|m| m == "async") {
            signature.push_str("async ");
        }
        signature.push_str("def ");
        signature.push_str(name);
        if let Some(parameters) = def.child_by_field_name("parameters") {
            signature.push_str(&collapse_whitespace(ctx.text(&parameters)?));
        }
        let return_type = def
            .child_by_field_name("return_type")
            .map(|r| ctx.text(&r))
            .transpose()?
            .map(collapse_whitespace);
        if let Some(return_type) = &return_type {
            signature.push_str(" -> ");
            signature.push_str(return_type);
        }

        let mut symbol = self
            .symbol(name, kind, &anchor, ctx)
            .with_signature(signature)
            .with_doc(docstring(&def, ctx));
        if let Some(return_type) = return_type {
            symbol.set_meta("returnType", return_type);
        }
        if !decorators.is_empty() {
            symbol.set_meta(
                "decorators",
                Value::Array(decorators.iter().cloned().map(Value::String).collect()),
            );
        }
        apply_modifiers(&mut symbol, &modifiers);
        Ok(symbol)
    }

    fn class(
        &self,
        anchor: Node<'_>,
        def: Node<'_>,
        decorators: &[String],
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Symbol, ExtractionError> {
        let name_node = def
            .child_by_field_name("name")
            .ok_or(ExtractionError::MissingName { node_kind: def.kind() })?;
        let name = ctx.text(&name_node)?;

        let mut bases = Vec::new();
        let mut signature = format!("class {}", name);
        if let Some(superclasses) = def.child_by_field_name("superclasses") {
            signature.push_str(&collapse_whitespace(ctx.text(&superclasses)?));
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    bases.push(Value::String(ctx.text(&base)?.to_string()));
                }
            }
        }

        let mut symbol = self
            .symbol(name, SymbolKind::Class, &anchor, ctx)
            .with_signature(signature)
            .with_doc(docstring(&def, ctx));
        if !bases.is_empty() {
            symbol.set_meta("baseClasses", Value::Array(bases));
        }
        if !decorators.is_empty() {
            symbol.set_meta(
                "decorators",
                Value::Array(decorators.iter().cloned().map(Value::String).collect()),
            );
        }
        apply_modifiers(&mut symbol, &decorator_modifiers(decorators));
        Ok(symbol)
    }

    /// Module-level variables and constants, class-level fields.
    fn assignment(
        &self,
        node: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        let in_class = match scope {
            None => false,
            Some(s) if s.kind == SymbolKind::Class => true,
            // Locals are not symbols
            Some(_) => return Ok(Visit::Continue),
        };
        let Some(left) = node.child_by_field_name("left") else {
            return Ok(Visit::Continue);
        };

        let targets: Vec<Node<'_>> = match left.kind() {
            "identifier" => vec![left],
            "pattern_list" | "tuple_pattern" => {
                let mut cursor = left.walk();
                let targets = left
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "identifier")
                    .collect();
                targets
            }
            _ => return Ok(Visit::Continue),
        };
        let single = targets.len() == 1;

        let annotation = node
            .child_by_field_name("type")
            .map(|t| ctx.text(&t))
            .transpose()?
            .map(collapse_whitespace);
        let value_kind = node.child_by_field_name("right").and_then(|r| literal_kind(r.kind()));
        let signature = collapse_whitespace(ctx.text(&node)?);

        let mut symbols = Vec::with_capacity(targets.len());
        for target in targets {
            let name = ctx.text(&target)?;
            let kind = if is_constant_name(name) {
                SymbolKind::Constant
            } else if in_class {
                SymbolKind::Field
            } else {
                SymbolKind::Variable
            };
            let anchor = if single { node } else { target };
            let mut symbol = self
                .symbol(name, kind, &anchor, ctx)
                .with_signature(signature.clone());
            if let Some(annotation) = &annotation {
                symbol.set_meta("type", annotation.clone());
            }
            if let Some(value_kind) = value_kind {
                symbol.set_meta("valueKind", value_kind);
            }
            symbols.push(symbol);
        }
        Ok(Visit::Emit(symbols))
    }

    fn import(&self, node: Node<'_>, ctx: &mut ExtractionContext<'_>) -> Result<Visit, ExtractionError> {
        let from_module = node
            .child_by_field_name("module_name")
            .map(|m| ctx.text(&m))
            .transpose()?;

        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        let single = names.len() == 1;
        let signature = collapse_whitespace(ctx.text(&node)?);

        let mut symbols = Vec::with_capacity(names.len());
        for name_node in names {
            let (imported, alias) = match name_node.kind() {
                "aliased_import" => {
                    let imported = name_node
                        .child_by_field_name("name")
                        .map(|n| ctx.text(&n))
                        .transpose()?;
                    let alias = name_node
                        .child_by_field_name("alias")
                        .map(|n| ctx.text(&n))
                        .transpose()?;
                    (imported, alias)
                }
                _ => (Some(ctx.text(&name_node)?), None),
            };
            let Some(imported) = imported else {
                continue;
            };

            let module = match from_module {
                Some(module) => format!("{}.{}", module, imported),
                None => imported.to_string(),
            };
            let bound = alias.unwrap_or(imported);
            let anchor = if single { node } else { name_node };

            let mut symbol = Symbol::new(
                bound,
                SymbolKind::Import,
                ctx.language(),
                ctx.file_path(),
                SymbolSpan::of_node(&anchor),
                Visibility::Public,
            )
            .with_signature(signature.clone());
            symbol.set_meta("module", module);
            if alias.is_some() {
                symbol.set_meta("importedName", imported);
            }
            symbols.push(symbol);
        }
        Ok(Visit::Emit(symbols))
    }
}

/// `__dunder__` and plain names are public, `__name` private, `_name` protected.
fn python_visibility(name: &str) -> Visibility {
    if name.starts_with("__") && name.ends_with("__") {
        Visibility::Public
    } else if name.starts_with("__") {
        Visibility::Private
    } else if name.starts_with('_') {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn decorator_modifiers(decorators: &[String]) -> Vec<String> {
    decorators
        .iter()
        .filter_map(|decorator| {
            let last = decorator.rsplit('.').next().unwrap_or(decorator);
            PYTHON_TABLE.lookup(last).map(str::to_string)
        })
        .collect()
}

fn literal_kind(node_kind: &str) -> Option<&'static str> {
    match node_kind {
        "integer" => Some("int"),
        "float" => Some("float"),
        "string" | "concatenated_string" => Some("str"),
        "true" | "false" => Some("bool"),
        "none" => Some("None"),
        "list" | "list_comprehension" => Some("list"),
        "dictionary" | "dictionary_comprehension" => Some("dict"),
        "set" | "set_comprehension" => Some("set"),
        "tuple" => Some("tuple"),
        _ => None,
    }
}

fn docstring(def: &Node, ctx: &ExtractionContext<'_>) -> Option<String> {
    let body = def.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let raw = ctx.text(&string).ok()?;
    let text = clean_docstring(raw);
    (!text.is_empty()).then_some(text)
}

fn clean_docstring(raw: &str) -> String {
    let unprefixed = raw.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|quote| {
            unprefixed
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        })
        .unwrap_or(unprefixed);
    inner
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn call_edge(
    node: Node<'_>,
    lookup: &SymbolLookup<'_>,
    ctx: &mut ExtractionContext<'_>,
) -> Option<Relationship> {
    let function = node.child_by_field_name("function")?;
    let callee_node = match function.kind() {
        "identifier" => function,
        "attribute" => function.child_by_field_name("attribute")?,
        _ => return None,
    };
    let callee = ctx.text(&callee_node).ok()?;
    let caller = lookup.innermost_at(node.start_byte(), |s| {
        s.kind.is_callable() || s.kind == SymbolKind::Property
    })?;
    Some(link(
        lookup,
        caller,
        callee,
        RelationshipKind::Calls,
        node.start_position().row + 1,
        |s| s.kind.is_callable() || s.kind.is_type(),
        ctx,
    ))
}
