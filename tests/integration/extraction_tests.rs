//! Extraction through the public registry API, across languages

use std::collections::HashMap;

use codesift::extraction::{ExtractorRegistry, FileExtraction, ParserPool};
use codesift::symbol::{
    RelationshipKind, Symbol, SymbolId, SymbolKind, Visibility, RECOVERED_CONFIDENCE,
};

fn extract(path: &str, language: &str, source: &str) -> FileExtraction {
    let registry = ExtractorRegistry::new();
    let mut pool = ParserPool::new();
    registry
        .extract_source(&mut pool, path, language, source)
        .unwrap()
}

fn find<'a>(extraction: &'a FileExtraction, name: &str) -> &'a Symbol {
    extraction
        .symbols
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no symbol named {}", name))
}

fn assert_parents_contain_children(extraction: &FileExtraction) {
    let by_id: HashMap<&SymbolId, &Symbol> =
        extraction.symbols.iter().map(|s| (&s.id, s)).collect();
    for symbol in &extraction.symbols {
        if let Some(parent_id) = &symbol.parent_id {
            let parent = by_id
                .get(parent_id)
                .unwrap_or_else(|| panic!("{} has a dangling parent", symbol.name));
            assert!(
                parent.strictly_contains(symbol),
                "{} is not inside {}",
                symbol.name,
                parent.name
            );
        }
    }
}

const CPP_SOURCE: &str = r#"#include "storage.h"

namespace geo {

class Polygon {
public:
    struct Vertex {
        double x;
        double y;
    };

    double perimeter() const {
        return measure();
    }

private:
    int count_;
};

}

static int instances = 0;
extern int shared_limit;
"#;

#[test]
fn test_cpp_nested_ownership() {
    let result = extract("src/geo/polygon.cpp", "cpp", CPP_SOURCE);

    let namespace = find(&result, "geo");
    let polygon = find(&result, "Polygon");
    let vertex = find(&result, "Vertex");
    let x = find(&result, "x");
    let perimeter = find(&result, "perimeter");

    assert_eq!(namespace.kind, SymbolKind::Namespace);
    assert_eq!(polygon.parent_id.as_ref(), Some(&namespace.id));
    assert_eq!(vertex.kind, SymbolKind::Struct);
    assert_eq!(vertex.parent_id.as_ref(), Some(&polygon.id));
    assert_eq!(x.parent_id.as_ref(), Some(&vertex.id));
    assert_eq!(perimeter.kind, SymbolKind::Method);
    assert_eq!(perimeter.parent_id.as_ref(), Some(&polygon.id));
    assert_eq!(find(&result, "count_").visibility, Visibility::Private);

    assert_parents_contain_children(&result);
}

#[test]
fn test_static_and_extern_classification() {
    let result = extract("src/geo/polygon.cpp", "cpp", CPP_SOURCE);

    let instances = find(&result, "instances");
    assert!(instances.meta_bool("isStatic"));
    assert!(!instances.meta_bool("isExtern"));
    assert_eq!(instances.visibility, Visibility::Private);

    let shared = find(&result, "shared_limit");
    assert!(shared.meta_bool("isExtern"));
    assert!(!shared.meta_bool("isStatic"));
}

#[test]
fn test_unresolved_targets_are_low_confidence() {
    let result = extract("src/geo/polygon.cpp", "cpp", CPP_SOURCE);

    let include = result
        .relationships
        .iter()
        .find(|r| r.kind == RelationshipKind::Imports)
        .unwrap();
    assert!(!include.is_resolved());
    assert!(include.confidence < 1.0);

    let perimeter = find(&result, "perimeter");
    let call = result
        .relationships
        .iter()
        .find(|r| r.kind == RelationshipKind::Calls && r.from_symbol_id == perimeter.id)
        .unwrap();
    assert!(!call.is_resolved());
    assert!(call.confidence < 1.0);
}

#[test]
fn test_extraction_is_deterministic() {
    let first = extract("src/geo/polygon.cpp", "cpp", CPP_SOURCE);
    let second = extract("src/geo/polygon.cpp", "cpp", CPP_SOURCE);

    let ids = |e: &FileExtraction| e.symbols.iter().map(|s| s.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.relationships.len(), second.relationships.len());
}

#[test]
fn test_python_classes_and_methods() {
    let source = r#"class Repository:
    """Loads users."""

    def find(self, user_id):
        return self._query(user_id)

    def _query(self, user_id):
        return None


def main():
    Repository().find(1)
"#;
    let result = extract("app/data/repository.py", "python", source);

    let repository = find(&result, "Repository");
    let find_method = find(&result, "find");
    let query = find(&result, "_query");

    assert_eq!(repository.doc_comment.as_deref(), Some("Loads users."));
    assert_eq!(find_method.parent_id.as_ref(), Some(&repository.id));
    assert_eq!(query.visibility, Visibility::Protected);
    assert_eq!(find(&result, "main").kind, SymbolKind::Function);

    assert_parents_contain_children(&result);
}

#[test]
fn test_broken_source_keeps_following_definitions() {
    let source = "def broken(:\n    pass\n\n\ndef intact():\n    return 1\n";
    let result = extract("app/broken.py", "python", source);

    assert!(result.symbols.iter().any(|s| s.name == "intact"));
}

fn assert_unique_ids(extraction: &FileExtraction) {
    let mut ids: Vec<&SymbolId> = extraction.symbols.iter().map(|s| &s.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), extraction.symbols.len(), "duplicate symbol ids");
}

#[test]
fn test_unterminated_python_class_is_recovered() {
    let source = r#"class Account:
    def deposit(self, amount):
        return amount


class Broken(
"#;
    let result = extract("app/domain/account.py", "python", source);

    let broken = find(&result, "Broken");
    assert!(broken.is_recovered());
    assert_eq!(broken.kind, SymbolKind::Class);
    assert_eq!(broken.confidence(), RECOVERED_CONFIDENCE);
    assert_eq!(broken.start_line, 6);
    assert_eq!(result.recovered_count(), 1);

    let account = find(&result, "Account");
    let deposit = find(&result, "deposit");
    assert!(!account.is_recovered());
    assert!(!deposit.is_recovered());
    assert_eq!(account.confidence(), 1.0);
    assert_eq!(deposit.parent_id.as_ref(), Some(&account.id));

    assert_eq!(result.symbols.iter().filter(|s| s.name == "Broken").count(), 1);
    assert_unique_ids(&result);
}

#[test]
fn test_unterminated_cpp_class_is_recovered() {
    let source = r#"int valid(int x) {
    return x + 1;
}

class Broken {
"#;
    let result = extract("src/broken.cpp", "cpp", source);

    let broken = find(&result, "Broken");
    assert!(broken.is_recovered());
    assert_eq!(broken.kind, SymbolKind::Class);
    assert_eq!(broken.confidence(), RECOVERED_CONFIDENCE);
    assert_eq!(broken.language, "cpp");

    let valid = find(&result, "valid");
    assert!(!valid.is_recovered());
    assert_eq!(valid.kind, SymbolKind::Function);
    assert_eq!(result.recovered_count(), 1);
    assert_eq!(result.symbols.iter().filter(|s| s.name == "valid").count(), 1);
    assert_unique_ids(&result);
}

#[test]
fn test_recovery_never_replaces_structured_symbols() {
    let source = "class Intact:\n    pass\n\n\nclass Intact(\n";
    let result = extract("app/models.py", "python", source);

    let structured: Vec<&Symbol> = result
        .symbols
        .iter()
        .filter(|s| s.name == "Intact" && !s.is_recovered())
        .collect();
    assert_eq!(structured.len(), 1);
    assert_eq!(structured[0].start_line, 1);
    assert_eq!(structured[0].confidence(), 1.0);

    for recovered in result.symbols.iter().filter(|s| s.is_recovered()) {
        assert_ne!(recovered.id, structured[0].id);
        assert_eq!(recovered.confidence(), RECOVERED_CONFIDENCE);
    }
    assert_unique_ids(&result);
}
