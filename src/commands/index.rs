//! Index command: extract symbols and rebuild every store under .codesift/.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::indexer::{ErrorReport, Indexer};
use crate::search::SemanticBackendFactory;
use crate::storage::{LanceVectorStore, MemorySymbolStore};

use super::Workspace;

/// Run the index command.
///
/// * `path` - Project root, the current directory when `None`
/// * `clear` - Drop all stored symbols and indexes first
/// * `no_embed` - Skip the embedding stage entirely
pub async fn run(path: Option<PathBuf>, clear: bool, no_embed: bool) -> Result<()> {
    let root = match path {
        Some(path) => path,
        None => env::current_dir()?,
    };
    let mut workspace = Workspace::open(&root)?;

    if clear {
        eprintln!("Clearing existing indexes...");
        workspace.symbols = Arc::new(MemorySymbolStore::new());
        workspace.lexical.clear()?;
        let vectors_path = workspace.config.vectors_path(&workspace.root);
        if vectors_path.exists() {
            let store =
                LanceVectorStore::new(&vectors_path, workspace.config.embeddings.dimension).await?;
            store.clear().await?;
        }
    }

    let mut indexer = Indexer::new(
        workspace.config.indexer.clone(),
        workspace.symbols.clone(),
        workspace.lexical.clone(),
    )
    .with_progress(true);

    if !no_embed {
        let backend = workspace
            .backend_factory()
            .create()
            .await
            .context("Failed to initialize embeddings (use --no-embed to skip)")?;
        indexer = indexer.with_semantic(backend, workspace.config.embeddings.batch_size);
    }

    let report = indexer.index_directory(&workspace.root).await?;
    workspace.persist()?;

    println!("Project root: {}", workspace.root.display());
    println!(
        "Indexed {} files ({} symbols, {} relationships) in {:.2}s",
        report.files_indexed,
        report.symbols,
        report.relationships,
        report.duration.as_secs_f64()
    );
    if !no_embed {
        println!("Embedded {} symbols", report.embedded_symbols);
    }
    if report.removed_files > 0 {
        println!("Removed {} deleted files from the indexes", report.removed_files);
    }
    if report.recovered_symbols > 0 || report.skipped_nodes > 0 {
        println!(
            "Recovered {} symbols from syntax errors, skipped {} nodes",
            report.recovered_symbols, report.skipped_nodes
        );
    }

    ErrorReport::from_errors(&report.errors).print_summary();

    Ok(())
}
