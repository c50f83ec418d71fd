//! Symbol and relationship records shared by extractors, stores, and search

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::identity::{Position, SymbolId};

/// Confidence assigned to edges whose endpoints are both extracted symbols
pub const RESOLVED_CONFIDENCE: f32 = 1.0;

/// Confidence assigned to edges pointing at a placeholder target
pub const UNRESOLVED_CONFIDENCE: f32 = 0.5;

/// Confidence recorded on symbols produced by error-region recovery
pub const RECOVERED_CONFIDENCE: f32 = 0.5;

/// Kind of a code entity, one vocabulary for every language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Constructor,
    Destructor,
    Operator,
    Class,
    Struct,
    Union,
    Interface,
    Trait,
    Enum,
    EnumMember,
    Namespace,
    Module,
    Import,
    Variable,
    Constant,
    Field,
    Property,
    Event,
    Delegate,
    TypeAlias,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 22] = [
        SymbolKind::Function,
        SymbolKind::Method,
        SymbolKind::Constructor,
        SymbolKind::Destructor,
        SymbolKind::Operator,
        SymbolKind::Class,
        SymbolKind::Struct,
        SymbolKind::Union,
        SymbolKind::Interface,
        SymbolKind::Trait,
        SymbolKind::Enum,
        SymbolKind::EnumMember,
        SymbolKind::Namespace,
        SymbolKind::Module,
        SymbolKind::Import,
        SymbolKind::Variable,
        SymbolKind::Constant,
        SymbolKind::Field,
        SymbolKind::Property,
        SymbolKind::Event,
        SymbolKind::Delegate,
        SymbolKind::TypeAlias,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Destructor => "destructor",
            SymbolKind::Operator => "operator",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Union => "union",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumMember => "enum_member",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Module => "module",
            SymbolKind::Import => "import",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Event => "event",
            SymbolKind::Delegate => "delegate",
            SymbolKind::TypeAlias => "type_alias",
        }
    }

    /// Parse the storage name of a kind
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Kinds that open a lexical scope other symbols can belong to
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Union
                | SymbolKind::Interface
                | SymbolKind::Trait
                | SymbolKind::Enum
                | SymbolKind::Namespace
                | SymbolKind::Module
                | SymbolKind::Function
                | SymbolKind::Method
                | SymbolKind::Constructor
                | SymbolKind::Destructor
                | SymbolKind::Operator
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Union
                | SymbolKind::Interface
                | SymbolKind::Trait
                | SymbolKind::Enum
                | SymbolKind::TypeAlias
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function
                | SymbolKind::Method
                | SymbolKind::Constructor
                | SymbolKind::Destructor
                | SymbolKind::Operator
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Internal => "internal",
        }
    }

    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.trim().trim_end_matches(':') {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            "internal" => Some(Visibility::Internal),
            _ => None,
        }
    }
}

/// A named, positioned code declaration extracted from one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub language: String,
    pub file_path: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SymbolId>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Fields needed to build a symbol; the id is computed from them
#[derive(Debug, Clone)]
pub struct SymbolSpan {
    pub start: Position,
    pub end: Position,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl SymbolSpan {
    pub fn of_node(node: &tree_sitter::Node) -> Self {
        Self {
            start: Position::from_point(node.start_position()),
            end: Position::from_point(node.end_position()),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        }
    }
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        language: impl Into<String>,
        file_path: impl Into<String>,
        span: SymbolSpan,
        visibility: Visibility,
    ) -> Self {
        let name = name.into();
        let file_path = file_path.into();
        let id = SymbolId::derive(&file_path, &name, span.start.line, span.start.column);
        Self {
            id,
            name,
            kind,
            language: language.into(),
            file_path,
            start_line: span.start.line,
            start_column: span.start.column,
            end_line: span.end.line,
            end_column: span.end.column,
            start_byte: span.start_byte,
            end_byte: span.end_byte,
            signature: None,
            doc_comment: None,
            visibility,
            parent_id: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Build a symbol from a text-pattern match inside a broken region.
    ///
    /// The span is the matched text; the record carries `recoveredFromError`
    /// and a lowered `confidence` in its metadata.
    pub fn recovered(
        name: impl Into<String>,
        kind: SymbolKind,
        language: impl Into<String>,
        file_path: impl Into<String>,
        span: SymbolSpan,
        parent_id: Option<SymbolId>,
    ) -> Self {
        let mut symbol = Self::new(name, kind, language, file_path, span, Visibility::Public);
        symbol.parent_id = parent_id;
        symbol
            .metadata
            .insert("recoveredFromError".to_string(), Value::Bool(true));
        symbol
            .metadata
            .insert("confidence".to_string(), Value::from(RECOVERED_CONFIDENCE as f64));
        symbol
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        let signature = signature.into();
        if !signature.is_empty() {
            self.signature = Some(signature);
        }
        self
    }

    pub fn with_doc(mut self, doc: Option<String>) -> Self {
        self.doc_comment = doc.filter(|d| !d.is_empty());
        self
    }

    pub fn with_parent(mut self, parent_id: Option<SymbolId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn meta_bool(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn is_recovered(&self) -> bool {
        self.meta_bool("recoveredFromError")
    }

    /// Extraction confidence; structured symbols carry none and count as 1.0
    pub fn confidence(&self) -> f32 {
        self.metadata
            .get("confidence")
            .and_then(Value::as_f64)
            .map_or(RESOLVED_CONFIDENCE, |c| c as f32)
    }

    /// Number of source lines the symbol spans
    pub fn line_span(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Strict byte-range containment: `self` encloses `other` and is not equal to it
    pub fn strictly_contains(&self, other: &Symbol) -> bool {
        self.start_byte <= other.start_byte
            && other.end_byte <= self.end_byte
            && (self.start_byte, self.end_byte) != (other.start_byte, other.end_byte)
    }

    /// Text used for embedding the symbol
    pub fn embedding_text(&self) -> String {
        let mut text = format!("{} {}", self.kind, self.name);
        if let Some(signature) = &self.signature {
            text.push('\n');
            text.push_str(signature);
        }
        if let Some(doc) = &self.doc_comment {
            text.push('\n');
            text.push_str(doc);
        }
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Extends,
    Implements,
    Calls,
    Imports,
    References,
    Uses,
    Contains,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Extends => "extends",
            RelationshipKind::Implements => "implements",
            RelationshipKind::Calls => "calls",
            RelationshipKind::Imports => "imports",
            RelationshipKind::References => "references",
            RelationshipKind::Uses => "uses",
            RelationshipKind::Contains => "contains",
        }
    }
}

/// A directed, typed edge between two symbols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_symbol_id: SymbolId,
    pub to_symbol_id: SymbolId,
    pub kind: RelationshipKind,
    pub file_path: String,
    pub line_number: usize,
    pub confidence: f32,
}

impl Relationship {
    /// Edge between two extracted symbols
    pub fn resolved(
        from: &Symbol,
        to: &Symbol,
        kind: RelationshipKind,
        line_number: usize,
    ) -> Self {
        Self {
            from_symbol_id: from.id.clone(),
            to_symbol_id: to.id.clone(),
            kind,
            file_path: from.file_path.clone(),
            line_number,
            confidence: RESOLVED_CONFIDENCE,
        }
    }

    /// Edge to a target that was not found among the extracted symbols
    pub fn unresolved(
        from: &Symbol,
        target_name: &str,
        kind: RelationshipKind,
        line_number: usize,
    ) -> Self {
        Self {
            from_symbol_id: from.id.clone(),
            to_symbol_id: SymbolId::unresolved(target_name),
            kind,
            file_path: from.file_path.clone(),
            line_number,
            confidence: UNRESOLVED_CONFIDENCE,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.to_symbol_id.is_unresolved()
    }
}
