//! End-to-end indexing workflows

use codesift::commands::Workspace;
use codesift::indexer::{Indexer, ProcessingStage};
use codesift::search::{LexicalIndex, SearchOptions};
use codesift::storage::{SymbolStore, VectorStore};
use codesift::symbol::RelationshipKind;

use crate::helpers::test_harness::TestHarness;

const C_SOURCE: &str = r#"#include <stdlib.h>

struct Buffer {
    char *data;
    size_t len;
};

static int grow(struct Buffer *buf) {
    return buf->len > 0;
}

int buffer_push(struct Buffer *buf, char c) {
    return grow(buf);
}
"#;

#[tokio::test]
async fn test_index_mixed_project() {
    let harness = TestHarness::new().unwrap();
    harness.create_test_file("src/buffer.c", C_SOURCE).unwrap();
    harness
        .create_test_file(
            "src/geometry.hpp",
            "class Shape {\npublic:\n    virtual double area() const = 0;\n};\n",
        )
        .unwrap();
    harness
        .create_test_file("tools/report.py", "def render(rows):\n    return len(rows)\n")
        .unwrap();
    harness.create_test_file("README.md", "# not indexed").unwrap();

    let report = harness.index().await.unwrap();

    assert_eq!(report.files_indexed, 3);
    assert!(report.errors.is_empty());
    assert_eq!(report.parse_failures, 0);
    assert_eq!(harness.symbols.file_count().await.unwrap(), 3);
    assert_eq!(harness.symbols.symbol_count().await.unwrap(), report.symbols);
    assert_eq!(harness.vectors.count().await.unwrap(), report.symbols);
    assert_eq!(harness.lexical.num_docs() as usize, report.symbols);

    let c_symbols = harness.symbols.symbols_in_file("src/buffer.c").await.unwrap();
    let grow = c_symbols.iter().find(|s| s.name == "grow").unwrap();
    assert!(grow.meta_bool("isStatic"));
    assert_eq!(grow.language, "c");

    let relationships = harness
        .symbols
        .relationships_in_file("src/buffer.c")
        .await
        .unwrap();
    let call = relationships
        .iter()
        .find(|r| r.kind == RelationshipKind::Calls)
        .unwrap();
    assert_eq!(call.to_symbol_id, grow.id);
    assert_eq!(call.confidence, 1.0);

    let shapes = harness.symbols.symbols_in_file("src/geometry.hpp").await.unwrap();
    assert!(shapes.iter().all(|s| s.language == "cpp"));
}

#[tokio::test]
async fn test_deleted_definitions_leave_every_store() {
    let harness = TestHarness::new().unwrap();
    let file = harness
        .create_test_file(
            "lib/jobs.py",
            "def enqueue_job():\n    pass\n\n\ndef retired_job():\n    pass\n",
        )
        .unwrap();
    harness.index().await.unwrap();

    std::fs::write(&file, "def enqueue_job():\n    pass\n").unwrap();
    harness.index().await.unwrap();

    assert_eq!(harness.symbols.symbol_count().await.unwrap(), 1);
    assert_eq!(harness.vectors.count().await.unwrap(), 1);
    assert!(harness
        .lexical
        .search_exact("retired_job", 10)
        .await
        .unwrap()
        .is_empty());

    let options = SearchOptions::default();
    let results = harness.engine().search("retired_job", &options).await.unwrap();
    assert!(results.iter().all(|r| r.name != "retired_job"));
}

#[tokio::test]
async fn test_deleted_file_leaves_every_store() {
    let harness = TestHarness::new().unwrap();
    harness
        .create_test_file("billing/invoice.py", "class Invoice:\n    def total(self):\n        pass\n")
        .unwrap();
    let legacy = harness
        .create_test_file("billing/legacy_ledger.py", "class LegacyLedger:\n    pass\n")
        .unwrap();
    harness.index().await.unwrap();
    assert_eq!(harness.symbols.file_count().await.unwrap(), 2);

    std::fs::remove_file(&legacy).unwrap();
    let report = harness.index().await.unwrap();

    assert_eq!(report.removed_files, 1);
    assert!(harness
        .symbols
        .symbols_in_file("billing/legacy_ledger.py")
        .await
        .unwrap()
        .is_empty());
    assert_eq!(harness.symbols.file_count().await.unwrap(), 1);
    assert_eq!(harness.vectors.count().await.unwrap(), 2);
    assert!(harness
        .lexical
        .search_exact("LegacyLedger", 10)
        .await
        .unwrap()
        .is_empty());

    let options = SearchOptions::default();
    let results = harness.engine().search("LegacyLedger", &options).await.unwrap();
    assert!(results
        .iter()
        .all(|r| r.file_path != "billing/legacy_ledger.py"));
}

#[tokio::test]
async fn test_deleted_file_leaves_persisted_workspace() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/keep.py"), "def keep():\n    pass\n").unwrap();
    std::fs::write(dir.path().join("src/drop.py"), "def dropped():\n    pass\n").unwrap();

    let index = |workspace: &Workspace| {
        Indexer::new(
            workspace.config.indexer.clone(),
            workspace.symbols.clone(),
            workspace.lexical.clone(),
        )
    };

    {
        let workspace = Workspace::open(dir.path()).unwrap();
        index(&workspace).index_directory(&workspace.root).await.unwrap();
        workspace.persist().unwrap();
    }

    std::fs::remove_file(dir.path().join("src/drop.py")).unwrap();

    {
        let workspace = Workspace::open(dir.path()).unwrap();
        let report = index(&workspace).index_directory(&workspace.root).await.unwrap();
        assert_eq!(report.removed_files, 1);
        workspace.persist().unwrap();
    }

    let workspace = Workspace::open(dir.path()).unwrap();
    assert_eq!(
        workspace.symbols.indexed_files().await.unwrap(),
        vec!["src/keep.py".to_string()]
    );
    assert!(workspace
        .lexical
        .search_exact("dropped", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unreadable_file_does_not_stop_indexing() {
    let harness = TestHarness::new().unwrap();
    harness
        .create_test_file("pkg/good.py", "def fine():\n    pass\n")
        .unwrap();
    std::fs::write(harness.path().join("pkg/latin1.py"), [0x63, 0xe9, 0x0a]).unwrap();

    let report = harness.index().await.unwrap();

    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, ProcessingStage::FileRead);
}

#[tokio::test]
async fn test_workspace_round_trip_without_embeddings() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/session.py"),
        "class SessionStore:\n    def expire(self):\n        pass\n",
    )
    .unwrap();

    {
        let workspace = Workspace::open(dir.path()).unwrap();
        let report = Indexer::new(
            workspace.config.indexer.clone(),
            workspace.symbols.clone(),
            workspace.lexical.clone(),
        )
        .index_directory(&workspace.root)
        .await
        .unwrap();
        assert_eq!(report.symbols, 2);
        workspace.persist().unwrap();
    }

    let workspace = Workspace::open(dir.path()).unwrap();
    assert_eq!(workspace.symbols.symbol_count().await.unwrap(), 2);

    let options = SearchOptions {
        include_semantic: false,
        ..Default::default()
    };
    let results = workspace
        .engine()
        .search("SessionStore", &options)
        .await
        .unwrap();
    assert_eq!(results[0].name, "SessionStore");
    assert_eq!(results[0].file_path, "src/session.py");
}
