//! C and C++ extractor.
//!
//! One implementation serves both grammars; the [`Dialect`] only changes the
//! language tag, the modifier table, and the recovery patterns. C++ node kinds
//! simply never appear in C trees.

use lazy_static::lazy_static;
use tree_sitter::{Node, Tree};

use crate::error::ExtractionError;
use crate::extraction::modifiers::{apply_modifiers, classify_modifiers, ModifierRule, ModifierTable};
use crate::extraction::recovery::RecoveryPattern;
use crate::extraction::resolve::{containment_edges, link, SymbolLookup};
use crate::extraction::walker::{walk_symbols, NodeVisitor, Scope, Visit};
use crate::extraction::{collapse_whitespace, ExtractionContext, LanguageExtractor};
use crate::symbol::{Relationship, RelationshipKind, Symbol, SymbolKind, SymbolSpan, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    C,
    Cpp,
}

impl Dialect {
    pub fn language_id(self) -> &'static str {
        match self {
            Dialect::C => "c",
            Dialect::Cpp => "cpp",
        }
    }
}

static C_MODIFIERS: &[ModifierRule] = &[
    ModifierRule { token: "static", modifier: "static" },
    ModifierRule { token: "extern", modifier: "extern" },
    ModifierRule { token: "inline", modifier: "inline" },
    ModifierRule { token: "register", modifier: "register" },
    ModifierRule { token: "const", modifier: "const" },
    ModifierRule { token: "volatile", modifier: "volatile" },
    ModifierRule { token: "_Thread_local", modifier: "threadLocal" },
];

static CPP_MODIFIERS: &[ModifierRule] = &[
    ModifierRule { token: "static", modifier: "static" },
    ModifierRule { token: "extern", modifier: "extern" },
    ModifierRule { token: "inline", modifier: "inline" },
    ModifierRule { token: "const", modifier: "const" },
    ModifierRule { token: "volatile", modifier: "volatile" },
    ModifierRule { token: "constexpr", modifier: "constexpr" },
    ModifierRule { token: "mutable", modifier: "mutable" },
    ModifierRule { token: "thread_local", modifier: "threadLocal" },
    ModifierRule { token: "virtual", modifier: "virtual" },
    ModifierRule { token: "virtual_function_specifier", modifier: "virtual" },
    ModifierRule { token: "explicit", modifier: "explicit" },
    ModifierRule { token: "explicit_function_specifier", modifier: "explicit" },
    ModifierRule { token: "override", modifier: "override" },
    ModifierRule { token: "final", modifier: "final" },
    ModifierRule { token: "noexcept", modifier: "noexcept" },
];

static C_TABLE: ModifierTable =
    ModifierTable::new(C_MODIFIERS, &["storage_class_specifier", "type_qualifier"]);

static CPP_TABLE: ModifierTable = ModifierTable::new(
    CPP_MODIFIERS,
    &["storage_class_specifier", "type_qualifier", "virtual_specifier"],
);

lazy_static! {
    static ref C_RECOVERY: Vec<RecoveryPattern> = vec![
        RecoveryPattern::new(r"\bstruct\s+([A-Za-z_]\w*)\s*\{", SymbolKind::Struct),
        RecoveryPattern::new(r"\bunion\s+([A-Za-z_]\w*)\s*\{", SymbolKind::Union),
        RecoveryPattern::new(r"\benum\s+([A-Za-z_]\w*)\s*\{", SymbolKind::Enum),
    ];
    static ref CPP_RECOVERY: Vec<RecoveryPattern> = vec![
        RecoveryPattern::new(r"\benum\s+(?:class\s+|struct\s+)?([A-Za-z_]\w*)", SymbolKind::Enum),
        RecoveryPattern::new(r"\bclass\s+([A-Za-z_]\w*)", SymbolKind::Class),
        RecoveryPattern::new(r"\bstruct\s+([A-Za-z_]\w*)", SymbolKind::Struct),
        RecoveryPattern::new(r"\bnamespace\s+([A-Za-z_]\w*)", SymbolKind::Namespace),
    ];
}

pub struct CFamilyExtractor {
    dialect: Dialect,
}

impl CFamilyExtractor {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl LanguageExtractor for CFamilyExtractor {
    fn language_id(&self) -> &'static str {
        self.dialect.language_id()
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

        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "call_expression" => {
                    if let Some(edge) = call_edge(node, &lookup, ctx) {
                        relationships.push(edge);
                    }
                }
                "base_class_clause" => relationships.extend(base_class_edges(node, &lookup, ctx)),
                "field_declaration" => relationships.extend(field_type_edges(node, &lookup, ctx)),
                _ => {}
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        for import in symbols.iter().filter(|s| s.kind == SymbolKind::Import) {
            relationships.push(link(
                &lookup,
                import,
                &import.name,
                RelationshipKind::Imports,
                import.start_line,
                |_| false,
                ctx,
            ));
        }

        relationships
    }

    fn modifier_table(&self) -> &ModifierTable {
        match self.dialect {
            Dialect::C => &C_TABLE,
            Dialect::Cpp => &CPP_TABLE,
        }
    }

    fn recovery_patterns(&self) -> &[RecoveryPattern] {
        match self.dialect {
            Dialect::C => C_RECOVERY.as_slice(),
            Dialect::Cpp => CPP_RECOVERY.as_slice(),
        }
    }
}

impl NodeVisitor for CFamilyExtractor {
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
            "function_definition" => self.function_definition(node, node, scope, ctx),
            "declaration" | "field_declaration" => self.declaration(node, node, scope, ctx),
            "class_specifier" => self.type_declaration(node, node, SymbolKind::Class, scope, ctx),
            "struct_specifier" => self.type_declaration(node, node, SymbolKind::Struct, scope, ctx),
            "union_specifier" => self.type_declaration(node, node, SymbolKind::Union, scope, ctx),
            "enum_specifier" => self.type_declaration(node, node, SymbolKind::Enum, scope, ctx),
            "enumerator" => self.enumerator(node, ctx),
            "namespace_definition" => self.namespace(node, ctx),
            "template_declaration" => self.template(node, scope, ctx),
            "type_definition" => self.type_definition(node, node, scope, ctx),
            "alias_declaration" => self.alias(node, node, scope, ctx),
            "preproc_include" => self.include(node, ctx),
            "preproc_def" | "preproc_function_def" => self.macro_definition(node, ctx),
            _ => Ok(Visit::Continue),
        }
    }
}

/// How a declarator names its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameForm {
    Plain,
    Destructor,
    Operator,
}

#[derive(Debug, Clone)]
struct DeclName {
    name: String,
    /// `A::B` for `A::B::name`
    qualifier: Option<String>,
    form: NameForm,
}

impl DeclName {
    fn owner(&self) -> Option<&str> {
        let qualifier = self.qualifier.as_deref()?;
        let last = qualifier.rsplit("::").next().unwrap_or(qualifier);
        Some(last.split('<').next().unwrap_or(last))
    }
}

impl CFamilyExtractor {
    fn symbol(
        &self,
        name: String,
        kind: SymbolKind,
        anchor: &Node,
        visibility: Visibility,
        ctx: &ExtractionContext<'_>,
    ) -> Symbol {
        Symbol::new(
            name,
            kind,
            ctx.language(),
            ctx.file_path(),
            SymbolSpan::of_node(anchor),
            visibility,
        )
    }

    fn function_definition(
        &self,
        anchor: Node<'_>,
        decl: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        let declarator = decl
            .child_by_field_name("declarator")
            .ok_or(ExtractionError::MissingName { node_kind: decl.kind() })?;
        let header_end = decl
            .child_by_field_name("body")
            .map(|body| body.start_byte())
            .unwrap_or(anchor.end_byte());
        let signature = collapse_whitespace(ctx.slice(anchor.start_byte(), header_end)?);

        let symbol = self.callable(anchor, decl, declarator, scope, signature, ctx)?;
        Ok(Visit::Open(symbol))
    }

    /// Function, method, constructor, destructor, or operator from a declarator
    /// that contains a `function_declarator`.
    fn callable(
        &self,
        anchor: Node<'_>,
        decl: Node<'_>,
        declarator: Node<'_>,
        scope: Option<&Scope>,
        signature: String,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Symbol, ExtractionError> {
        let missing = ExtractionError::MissingName { node_kind: decl.kind() };
        let function_declarator = find_function_declarator(declarator).ok_or(missing.clone())?;
        let name_node = function_declarator
            .child_by_field_name("declarator")
            .ok_or(missing.clone())?;
        let decl_name = declarator_name(name_node, ctx)?.ok_or(missing)?;

        let return_type = decl
            .child_by_field_name("type")
            .map(|t| ctx.text(&t))
            .transpose()?
            .map(|t| format!("{}{}", collapse_whitespace(t), pointer_suffix(declarator)));

        let owner_scope = scope.filter(|s| is_record(s.kind));
        let kind = match decl_name.form {
            NameForm::Operator => SymbolKind::Operator,
            NameForm::Destructor => SymbolKind::Destructor,
            NameForm::Plain => {
                let owner = owner_scope.map(|s| s.name.as_str()).or_else(|| decl_name.owner());
                match owner {
                    Some(owner) if return_type.is_none() && decl_name.name == owner => {
                        SymbolKind::Constructor
                    }
                    Some(_) => SymbolKind::Method,
                    None => SymbolKind::Function,
                }
            }
        };

        let table = self.modifier_table();
        let mut modifiers = classify_modifiers(table, &decl, ctx.source());
        modifiers.extend(classify_modifiers(table, &function_declarator, ctx.source()));
        modifiers.sort();
        modifiers.dedup();

        let visibility = self.resolve_visibility(&anchor, scope, &modifiers, ctx)?;
        let mut symbol = self
            .symbol(decl_name.name.clone(), kind, &anchor, visibility, ctx)
            .with_signature(signature)
            .with_doc(doc_comment(&anchor, ctx));

        if let Some(return_type) = return_type {
            symbol.set_meta("returnType", return_type);
        }
        if let Some(parameters) = function_declarator.child_by_field_name("parameters") {
            symbol.set_meta("parameters", collapse_whitespace(ctx.text(&parameters)?));
        }
        if let (Some(qualifier), Some(owner)) = (decl_name.qualifier.as_deref(), decl_name.owner()) {
            symbol.set_meta("ownerType", owner);
            symbol.set_meta("qualifiedName", format!("{}::{}", qualifier, decl_name.name));
        }
        if decl.child_by_field_name("body").is_none() {
            symbol.set_meta("isDeclaration", true);
        }
        apply_modifiers(&mut symbol, &modifiers);

        Ok(symbol)
    }

    fn declaration(
        &self,
        anchor: Node<'_>,
        decl: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        // Locals are not symbols
        if scope.is_some_and(|s| s.is_callable()) {
            return Ok(Visit::Continue);
        }

        let modifiers = classify_modifiers(self.modifier_table(), &decl, ctx.source());
        let type_node = decl.child_by_field_name("type");
        let type_text = type_node.map(|t| type_signature(&t, ctx)).transpose()?;

        let mut cursor = decl.walk();
        let declarators: Vec<Node<'_>> = decl.children_by_field_name("declarator", &mut cursor).collect();
        let single = declarators.len() == 1;
        let in_record = scope.is_some_and(|s| is_record(s.kind));

        let mut symbols = Vec::with_capacity(declarators.len());
        for declarator in declarators {
            let target = if single { anchor } else { declarator };

            if find_function_declarator(declarator).is_some() {
                let signature = if single {
                    collapse_whitespace(ctx.slice(anchor.start_byte(), declarator.end_byte())?)
                } else {
                    join_signature(type_text.as_deref(), ctx.text(&declarator)?)
                };
                symbols.push(self.callable(target, decl, declarator, scope, signature, ctx)?);
                continue;
            }

            let Some(name) = declarator_name(declarator, ctx)? else {
                continue;
            };
            let kind = if in_record || decl.kind() == "field_declaration" {
                SymbolKind::Field
            } else if modifiers.iter().any(|m| m == "const" || m == "constexpr") {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };

            let has_body = type_node.is_some_and(|t| t.child_by_field_name("body").is_some());
            let signature = if single && !has_body {
                collapse_whitespace(ctx.slice(decl.start_byte(), declarator.end_byte())?)
            } else {
                join_signature(type_text.as_deref(), ctx.text(&declarator)?)
            };

            let visibility = self.resolve_visibility(&anchor, scope, &modifiers, ctx)?;
            let mut symbol = self
                .symbol(name.name, kind, &target, visibility, ctx)
                .with_signature(signature)
                .with_doc(doc_comment(&anchor, ctx));
            if let Some(type_text) = &type_text {
                symbol.set_meta("type", format!("{}{}", type_text, pointer_suffix(declarator)));
            }
            apply_modifiers(&mut symbol, &modifiers);
            symbols.push(symbol);
        }

        Ok(Visit::Emit(symbols))
    }

    fn type_declaration(
        &self,
        anchor: Node<'_>,
        decl: Node<'_>,
        kind: SymbolKind,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        // Forward declarations and type references carry no body
        let Some(body) = decl.child_by_field_name("body") else {
            return Ok(Visit::Continue);
        };
        let Some(name_node) = decl.child_by_field_name("name") else {
            return Ok(Visit::Continue);
        };
        let Some(name) = type_name(name_node, ctx)? else {
            return Ok(Visit::Continue);
        };

        let visibility = self.resolve_visibility(&anchor, scope, &[], ctx)?;
        let signature = collapse_whitespace(ctx.slice(anchor.start_byte(), body.start_byte())?);
        let mut symbol = self
            .symbol(name, kind, &anchor, visibility, ctx)
            .with_signature(signature)
            .with_doc(doc_comment(&anchor, ctx));

        let mut bases = Vec::new();
        let mut cursor = decl.walk();
        for child in decl.children(&mut cursor) {
            match child.kind() {
                "base_class_clause" => {
                    let mut inner = child.walk();
                    for base in child.named_children(&mut inner) {
                        if let Some(base_name) = type_name(base, ctx)? {
                            bases.push(serde_json::Value::String(base_name));
                        }
                    }
                }
                "class" | "struct" if kind == SymbolKind::Enum => symbol.set_meta("isScoped", true),
                _ => {}
            }
        }
        if !bases.is_empty() {
            symbol.set_meta("baseClasses", serde_json::Value::Array(bases));
        }

        Ok(Visit::Open(symbol))
    }

    fn enumerator(&self, node: Node<'_>, ctx: &mut ExtractionContext<'_>) -> Result<Visit, ExtractionError> {
        let name_node = node
            .child_by_field_name("name")
            .ok_or(ExtractionError::MissingName { node_kind: node.kind() })?;
        let mut symbol = self
            .symbol(ctx.text(&name_node)?.to_string(), SymbolKind::EnumMember, &node, Visibility::Public, ctx)
            .with_signature(collapse_whitespace(ctx.text(&node)?));
        if let Some(value) = node.child_by_field_name("value") {
            symbol.set_meta("value", collapse_whitespace(ctx.text(&value)?));
        }
        Ok(Visit::Emit(vec![symbol]))
    }

    fn namespace(&self, node: Node<'_>, ctx: &mut ExtractionContext<'_>) -> Result<Visit, ExtractionError> {
        // Anonymous namespaces open no scope of their own
        let Some(name_node) = node.child_by_field_name("name") else {
            return Ok(Visit::Continue);
        };
        let name = ctx.text(&name_node)?.to_string();
        let symbol = self
            .symbol(name.clone(), SymbolKind::Namespace, &node, Visibility::Public, ctx)
            .with_signature(format!("namespace {}", name))
            .with_doc(doc_comment(&node, ctx));
        Ok(Visit::Open(symbol))
    }

    /// `template<...>` wrappers emit the inner declaration once, spanning the wrapper.
    fn template(
        &self,
        node: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        let Some(inner) = template_inner(node) else {
            return Ok(Visit::Continue);
        };

        let visit = match inner.kind() {
            "function_definition" => self.function_definition(node, inner, scope, ctx)?,
            "declaration" | "field_declaration" => self.declaration(node, inner, scope, ctx)?,
            "class_specifier" => self.type_declaration(node, inner, SymbolKind::Class, scope, ctx)?,
            "struct_specifier" => self.type_declaration(node, inner, SymbolKind::Struct, scope, ctx)?,
            "union_specifier" => self.type_declaration(node, inner, SymbolKind::Union, scope, ctx)?,
            "alias_declaration" => self.alias(node, inner, scope, ctx)?,
            _ => return Ok(Visit::Continue),
        };
        ctx.mark_processed(&inner);

        let parameters = node
            .child_by_field_name("parameters")
            .map(|p| ctx.text(&p))
            .transpose()?
            .map(collapse_whitespace);
        let mark = |symbol: &mut Symbol| {
            symbol.set_meta("isTemplate", true);
            if let Some(parameters) = &parameters {
                symbol.set_meta("templateParameters", parameters.clone());
            }
        };

        Ok(match visit {
            Visit::Open(mut symbol) => {
                mark(&mut symbol);
                Visit::Open(symbol)
            }
            Visit::Emit(mut symbols) => {
                symbols.iter_mut().for_each(mark);
                Visit::Emit(symbols)
            }
            other => other,
        })
    }

    fn type_definition(
        &self,
        anchor: Node<'_>,
        decl: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        let alias_of = decl
            .child_by_field_name("type")
            .map(|t| type_signature(&t, ctx))
            .transpose()?;
        let visibility = self.resolve_visibility(&anchor, scope, &[], ctx)?;

        let mut cursor = decl.walk();
        let declarators: Vec<Node<'_>> = decl.children_by_field_name("declarator", &mut cursor).collect();
        let single = declarators.len() == 1;

        let mut symbols = Vec::new();
        for declarator in declarators {
            let Some(name) = declarator_name(declarator, ctx)? else {
                continue;
            };
            let target = if single { anchor } else { declarator };
            let mut symbol = self
                .symbol(name.name.clone(), SymbolKind::TypeAlias, &target, visibility, ctx)
                .with_signature(join_signature(
                    Some(&format!("typedef {}", alias_of.as_deref().unwrap_or(""))),
                    ctx.text(&declarator)?,
                ))
                .with_doc(doc_comment(&anchor, ctx));
            if let Some(alias_of) = &alias_of {
                symbol.set_meta("aliasOf", alias_of.clone());
            }
            symbols.push(symbol);
        }
        Ok(Visit::Emit(symbols))
    }

    fn alias(
        &self,
        anchor: Node<'_>,
        decl: Node<'_>,
        scope: Option<&Scope>,
        ctx: &mut ExtractionContext<'_>,
    ) -> Result<Visit, ExtractionError> {
        let name_node = decl
            .child_by_field_name("name")
            .ok_or(ExtractionError::MissingName { node_kind: decl.kind() })?;
        let visibility = self.resolve_visibility(&anchor, scope, &[], ctx)?;
        let signature = collapse_whitespace(ctx.text(&anchor)?.trim_end_matches(';'));
        let mut symbol = self
            .symbol(ctx.text(&name_node)?.to_string(), SymbolKind::TypeAlias, &anchor, visibility, ctx)
            .with_signature(signature)
            .with_doc(doc_comment(&anchor, ctx));
        if let Some(target) = decl.child_by_field_name("type") {
            symbol.set_meta("aliasOf", collapse_whitespace(ctx.text(&target)?));
        }
        Ok(Visit::Emit(vec![symbol]))
    }

    fn include(&self, node: Node<'_>, ctx: &mut ExtractionContext<'_>) -> Result<Visit, ExtractionError> {
        let Some(path_node) = node.child_by_field_name("path") else {
            return Ok(Visit::Prune);
        };
        let raw = ctx.text(&path_node)?.trim();
        let path = raw.trim_matches(|c| c == '"' || c == '<' || c == '>');
        if path.is_empty() {
            return Ok(Visit::Prune);
        }

        let mut symbol = self
            .symbol(path.to_string(), SymbolKind::Import, &node, Visibility::Public, ctx)
            .with_signature(format!("#include {}", raw));
        symbol.set_meta("system", raw.starts_with('<'));
        Ok(Visit::Emit(vec![symbol]))
    }

    fn macro_definition(&self, node: Node<'_>, ctx: &mut ExtractionContext<'_>) -> Result<Visit, ExtractionError> {
        let name_node = node
            .child_by_field_name("name")
            .ok_or(ExtractionError::MissingName { node_kind: node.kind() })?;
        let function_like = node.kind() == "preproc_function_def";
        let kind = if function_like {
            SymbolKind::Function
        } else {
            SymbolKind::Constant
        };

        let mut symbol = self
            .symbol(ctx.text(&name_node)?.to_string(), kind, &node, Visibility::Public, ctx)
            .with_signature(collapse_whitespace(ctx.text(&node)?))
            .with_doc(doc_comment(&node, ctx));
        symbol.set_meta("isMacro", true);
        if let Some(value) = node.child_by_field_name("value") {
            symbol.set_meta("value", collapse_whitespace(ctx.text(&value)?));
        }
        if let Some(parameters) = node.child_by_field_name("parameters") {
            symbol.set_meta("parameters", collapse_whitespace(ctx.text(&parameters)?));
        }
        Ok(Visit::Emit(vec![symbol]))
    }

    /// Visibility from the nearest preceding access specifier inside a record,
    /// else the record's default; outside records, file-static is private.
    fn resolve_visibility(
        &self,
        anchor: &Node,
        scope: Option<&Scope>,
        modifiers: &[String],
        ctx: &ExtractionContext<'_>,
    ) -> Result<Visibility, ExtractionError> {
        let Some(record) = scope.filter(|s| is_record(s.kind)) else {
            if modifiers.iter().any(|m| m == "static") {
                return Ok(Visibility::Private);
            }
            return Ok(Visibility::Public);
        };

        let mut previous = anchor.prev_sibling();
        while let Some(sibling) = previous {
            if sibling.kind() == "access_specifier" {
                if let Some(visibility) = Visibility::parse(ctx.text(&sibling)?) {
                    return Ok(visibility);
                }
            }
            previous = sibling.prev_sibling();
        }

        Ok(match record.kind {
            SymbolKind::Class => Visibility::Private,
            _ => Visibility::Public,
        })
    }
}

fn is_record(kind: SymbolKind) -> bool {
    matches!(kind, SymbolKind::Class | SymbolKind::Struct | SymbolKind::Union)
}

/// The function declarator inside `node`, looking through pointer and
/// reference wrappers. Function pointers (`int (*fp)(int)`) are variables.
fn find_function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "function_declarator" => {
            let inner = node.child_by_field_name("declarator")?;
            if inner.kind() == "parenthesized_declarator" {
                None
            } else {
                Some(node)
            }
        }
        "pointer_declarator" | "reference_declarator" | "attributed_declarator" => node
            .child_by_field_name("declarator")
            .or_else(|| node.named_child(0))
            .and_then(find_function_declarator),
        _ => None,
    }
}

fn declarator_name(node: Node<'_>, ctx: &ExtractionContext<'_>) -> Result<Option<DeclName>, ExtractionError> {
    let plain = |text: &str, form| DeclName {
        name: text.to_string(),
        qualifier: None,
        form,
    };

    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "namespace_identifier" => {
            Ok(Some(plain(ctx.text(&node)?, NameForm::Plain)))
        }
        "destructor_name" => Ok(Some(plain(&collapse_whitespace(ctx.text(&node)?), NameForm::Destructor))),
        "operator_name" => Ok(Some(plain(&collapse_whitespace(ctx.text(&node)?), NameForm::Operator))),
        "qualified_identifier" => {
            let scope = node
                .child_by_field_name("scope")
                .map(|s| ctx.text(&s))
                .transpose()?;
            let Some(name_node) = node.child_by_field_name("name") else {
                return Ok(None);
            };
            let Some(mut inner) = declarator_name(name_node, ctx)? else {
                return Ok(None);
            };
            inner.qualifier = match (scope, inner.qualifier.take()) {
                (Some(scope), Some(rest)) => Some(format!("{}::{}", scope, rest)),
                (Some(scope), None) => Some(scope.to_string()),
                (None, rest) => rest,
            };
            Ok(Some(inner))
        }
        "template_function" | "template_method" | "template_type" => match node.child_by_field_name("name") {
            Some(name) => declarator_name(name, ctx),
            None => Ok(None),
        },
        "reference_declarator" | "parenthesized_declarator" | "attributed_declarator" => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            for child in children {
                if let Some(found) = declarator_name(child, ctx)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        }
        _ => match node.child_by_field_name("declarator") {
            Some(inner) => declarator_name(inner, ctx),
            None => Ok(None),
        },
    }
}

/// Plain name of a type reference: `ns::Base<T>` becomes `Base`
fn type_name(node: Node<'_>, ctx: &ExtractionContext<'_>) -> Result<Option<String>, ExtractionError> {
    match node.kind() {
        "type_identifier" | "identifier" => Ok(Some(ctx.text(&node)?.to_string())),
        "template_type" | "qualified_identifier" | "struct_specifier" | "class_specifier"
        | "union_specifier" | "enum_specifier" => match node.child_by_field_name("name") {
            Some(name) => type_name(name, ctx),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Type text for signatures; record bodies are cut off
fn type_signature(node: &Node, ctx: &ExtractionContext<'_>) -> Result<String, ExtractionError> {
    let text = match node.child_by_field_name("body") {
        Some(body) => ctx.slice(node.start_byte(), body.start_byte())?,
        None => ctx.text(node)?,
    };
    Ok(collapse_whitespace(text))
}

fn join_signature(type_text: Option<&str>, declarator: &str) -> String {
    let declarator = collapse_whitespace(declarator);
    match type_text {
        Some(type_text) if !type_text.is_empty() => format!("{} {}", type_text, declarator),
        _ => declarator,
    }
}

/// `*`/`&` markers contributed by the declarator chain
fn pointer_suffix(declarator: Node<'_>) -> String {
    let mut suffix = String::new();
    let mut current = Some(declarator);
    while let Some(node) = current {
        match node.kind() {
            "pointer_declarator" => suffix.push('*'),
            "reference_declarator" => suffix.push('&'),
            _ => break,
        }
        current = node.child_by_field_name("declarator").or_else(|| node.named_child(0));
    }
    suffix
}

fn template_inner(node: Node<'_>) -> Option<Node<'_>> {
    let parameters = node.child_by_field_name("parameters");
    let mut cursor = node.walk();
    let inner = node
        .named_children(&mut cursor)
        .find(|child| {
            Some(*child) != parameters && !matches!(child.kind(), "comment" | "requires_clause")
        });
    inner
}

/// Consecutive comments directly above a declaration.
fn doc_comment(node: &Node, ctx: &ExtractionContext<'_>) -> Option<String> {
    let mut anchor = *node;
    while anchor.prev_sibling().is_none() {
        match anchor.parent() {
            Some(parent)
                if matches!(
                    parent.kind(),
                    "declaration" | "template_declaration" | "type_definition" | "field_declaration"
                ) =>
            {
                anchor = parent
            }
            _ => break,
        }
    }

    let mut lines = Vec::new();
    let mut next_row = anchor.start_position().row;
    let mut current = anchor.prev_sibling();
    while let Some(previous) = current {
        if previous.kind() != "comment" || previous.end_position().row + 1 < next_row {
            break;
        }
        lines.push(clean_comment(ctx.text(&previous).ok()?));
        next_row = previous.start_position().row;
        current = previous.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

fn clean_comment(comment: &str) -> String {
    let trimmed = comment.trim();
    let body = match trimmed.strip_prefix("/*") {
        Some(rest) => rest.strip_suffix("*/").unwrap_or(rest),
        None => trimmed,
    };
    body.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches('/')
                .trim_start_matches('*')
                .trim_start_matches('!')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn callee_name<'s>(node: Node<'_>, ctx: &ExtractionContext<'s>) -> Option<&'s str> {
    match node.kind() {
        "identifier" | "field_identifier" => ctx.text(&node).ok(),
        "field_expression" => node
            .child_by_field_name("field")
            .and_then(|field| callee_name(field, ctx)),
        "qualified_identifier" | "template_function" | "template_method" => node
            .child_by_field_name("name")
            .and_then(|name| callee_name(name, ctx)),
        _ => None,
    }
}

fn call_edge(
    node: Node<'_>,
    lookup: &SymbolLookup<'_>,
    ctx: &mut ExtractionContext<'_>,
) -> Option<Relationship> {
    let function = node.child_by_field_name("function")?;
    let callee = callee_name(function, ctx)?;
    let caller = lookup.innermost_at(node.start_byte(), |s| s.kind.is_callable())?;
    Some(link(
        lookup,
        caller,
        callee,
        RelationshipKind::Calls,
        node.start_position().row + 1,
        |s| s.kind.is_callable(),
        ctx,
    ))
}

fn base_class_edges(
    clause: Node<'_>,
    lookup: &SymbolLookup<'_>,
    ctx: &mut ExtractionContext<'_>,
) -> Vec<Relationship> {
    let Some(owner) = lookup.innermost_at(clause.start_byte(), |s| is_record(s.kind)) else {
        return Vec::new();
    };
    let line = clause.start_position().row + 1;
    let mut cursor = clause.walk();
    let bases: Vec<Node<'_>> = clause.named_children(&mut cursor).collect();

    let mut edges = Vec::new();
    for base in bases {
        if let Ok(Some(name)) = type_name(base, ctx) {
            edges.push(link(lookup, owner, &name, RelationshipKind::Extends, line, |s| s.kind.is_type(), ctx));
        }
    }
    edges
}

fn field_type_edges(
    field: Node<'_>,
    lookup: &SymbolLookup<'_>,
    ctx: &mut ExtractionContext<'_>,
) -> Vec<Relationship> {
    let mut cursor = field.walk();
    let declares_method = field
        .children_by_field_name("declarator", &mut cursor)
        .any(|d| find_function_declarator(d).is_some());
    if declares_method {
        return Vec::new();
    }
    let Some(type_node) = field.child_by_field_name("type") else {
        return Vec::new();
    };
    let Some(owner) = lookup.innermost_at(field.start_byte(), |s| is_record(s.kind)) else {
        return Vec::new();
    };
    match type_name(type_node, ctx) {
        Ok(Some(name)) => vec![link(
            lookup,
            owner,
            &name,
            RelationshipKind::Uses,
            field.start_position().row + 1,
            |s| s.kind.is_type(),
            ctx,
        )],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::parser_pool::ParserPool;
    use crate::extraction::FileExtraction;

    fn extract(dialect: Dialect, source: &str) -> FileExtraction {
        let extractor = CFamilyExtractor::new(dialect);
        let mut pool = ParserPool::new();
        let tree = pool.parse(dialect.language_id(), source).unwrap();
        let mut ctx = ExtractionContext::new("src/sample", dialect.language_id(), source);
        extractor.extract(&tree, &mut ctx)
    }

    fn find<'a>(extraction: &'a FileExtraction, name: &str) -> &'a Symbol {
        extraction
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no symbol named {}", name))
    }

    #[test]
    fn test_static_and_extern_variables() {
        let result = extract(Dialect::C, "static int static_var = 0;\nextern int extern_var;\n");

        let static_var = find(&result, "static_var");
        assert_eq!(static_var.kind, SymbolKind::Variable);
        assert!(static_var.meta_bool("isStatic"));
        assert_eq!(static_var.visibility, Visibility::Private);
        assert_eq!(static_var.signature.as_deref(), Some("static int static_var = 0"));

        let extern_var = find(&result, "extern_var");
        assert_eq!(extern_var.kind, SymbolKind::Variable);
        assert!(extern_var.meta_bool("isExtern"));
        assert!(!extern_var.meta_bool("isStatic"));
    }

    #[test]
    fn test_c_functions_structs_and_prototypes() {
        let source = r#"#include <stdio.h>
#define MAX_USERS 64

/* A point in the plane */
struct Point {
    int x;
    int y;
};

int add(int a, int b);

static double area(struct Point *p) {
    return p->x * p->y;
}
"#;
        let result = extract(Dialect::C, source);

        let include = find(&result, "stdio.h");
        assert_eq!(include.kind, SymbolKind::Import);
        assert!(include.meta_bool("system"));

        let max = find(&result, "MAX_USERS");
        assert_eq!(max.kind, SymbolKind::Constant);
        assert!(max.meta_bool("isMacro"));

        let point = find(&result, "Point");
        assert_eq!(point.kind, SymbolKind::Struct);
        assert_eq!(point.doc_comment.as_deref(), Some("A point in the plane"));

        let x = find(&result, "x");
        assert_eq!(x.kind, SymbolKind::Field);
        assert_eq!(x.parent_id.as_ref(), Some(&point.id));
        assert_eq!(x.visibility, Visibility::Public);

        let add = find(&result, "add");
        assert_eq!(add.kind, SymbolKind::Function);
        assert!(add.meta_bool("isDeclaration"));

        let area = find(&result, "area");
        assert_eq!(area.kind, SymbolKind::Function);
        assert_eq!(area.meta_str("returnType"), Some("double"));
        assert_eq!(result.types[&area.id], "double");
        assert!(area.meta_bool("isStatic"));
    }

    #[test]
    fn test_class_members_and_nesting() {
        let source = r#"class Person {
public:
    Person(int age) : age_(age) {}
    void greet() const {
        helper();
    }
    ~Person() {}
private:
    int age_;
};
"#;
        let result = extract(Dialect::Cpp, source);

        let person = find(&result, "Person");
        assert_eq!(person.kind, SymbolKind::Class);

        let greet = find(&result, "greet");
        assert_eq!(greet.kind, SymbolKind::Method);
        assert_eq!(greet.parent_id.as_ref(), Some(&person.id));
        assert_eq!(greet.visibility, Visibility::Public);
        assert!(greet.meta_bool("isConst"));

        let destructor = find(&result, "~Person");
        assert_eq!(destructor.kind, SymbolKind::Destructor);

        let age = find(&result, "age_");
        assert_eq!(age.kind, SymbolKind::Field);
        assert_eq!(age.visibility, Visibility::Private);
        assert_eq!(age.parent_id.as_ref(), Some(&person.id));

        let constructor = result
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Constructor)
            .unwrap();
        assert_eq!(constructor.name, "Person");
        assert_eq!(constructor.parent_id.as_ref(), Some(&person.id));
    }

    #[test]
    fn test_unresolved_call_is_low_confidence() {
        let source = "class Person {\npublic:\n    void greet() { helper(); }\n};\n";
        let result = extract(Dialect::Cpp, source);

        let calls: Vec<_> = result
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Calls)
            .collect();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].confidence < 1.0);
        assert!(!calls[0].is_resolved());
    }

    #[test]
    fn test_resolved_call_is_full_confidence() {
        let source = "int helper(void) { return 1; }\nint main(void) { return helper(); }\n";
        let result = extract(Dialect::C, source);

        let helper = find(&result, "helper");
        let main = find(&result, "main");
        let call = result
            .relationships
            .iter()
            .find(|r| r.kind == RelationshipKind::Calls)
            .unwrap();
        assert_eq!(call.from_symbol_id, main.id);
        assert_eq!(call.to_symbol_id, helper.id);
        assert_eq!(call.confidence, 1.0);
    }

    #[test]
    fn test_template_class_is_emitted_once() {
        let source = r#"template <typename T>
class Box {
public:
    T get() const { return value; }
private:
    T value;
};
"#;
        let result = extract(Dialect::Cpp, source);

        let boxes: Vec<_> = result.symbols.iter().filter(|s| s.name == "Box").collect();
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].meta_bool("isTemplate"));
        assert_eq!(boxes[0].start_line, 1);

        let get = find(&result, "get");
        assert_eq!(get.parent_id.as_ref(), Some(&boxes[0].id));
    }

    #[test]
    fn test_inheritance_and_namespaces() {
        let source = r#"namespace shapes {
struct Shape { virtual double area() const; };
class Circle : public Shape {
public:
    double area() const override;
};
}
"#;
        let result = extract(Dialect::Cpp, source);

        let namespace = find(&result, "shapes");
        let shape = find(&result, "Shape");
        let circle = find(&result, "Circle");
        assert_eq!(namespace.kind, SymbolKind::Namespace);
        assert_eq!(circle.parent_id.as_ref(), Some(&namespace.id));

        let extends = result
            .relationships
            .iter()
            .find(|r| r.kind == RelationshipKind::Extends)
            .unwrap();
        assert_eq!(extends.from_symbol_id, circle.id);
        assert_eq!(extends.to_symbol_id, shape.id);
        assert_eq!(extends.confidence, 1.0);
    }

    #[test]
    fn test_out_of_class_method_records_owner() {
        let source = "class Counter { public: void bump(); };\nvoid Counter::bump() {}\n";
        let result = extract(Dialect::Cpp, source);

        let definition = result
            .symbols
            .iter()
            .find(|s| s.name == "bump" && !s.meta_bool("isDeclaration"))
            .unwrap();
        assert_eq!(definition.kind, SymbolKind::Method);
        assert_eq!(definition.meta_str("ownerType"), Some("Counter"));
        assert!(definition.parent_id.is_none());
    }

    #[test]
    fn test_local_variables_are_not_symbols() {
        let result = extract(Dialect::C, "void run(void) {\n    int local = 3;\n}\n");
        assert!(result.symbols.iter().all(|s| s.name != "local"));
    }

    #[test]
    fn test_clean_comment() {
        assert_eq!(clean_comment("// hello"), "hello");
        assert_eq!(clean_comment("/**\n * Doc line\n */"), "Doc line");
        assert_eq!(clean_comment("/// triple"), "triple");
    }
}
