//! Stats command for displaying index statistics and metrics

use anyhow::{bail, Result};
use std::env;

use crate::metrics::{gather_metrics, MetricSnapshot, INDEXED_FILES, INDEXED_SYMBOLS};
use crate::storage::SymbolStore;
use crate::Config;

use super::Workspace;

/// Current index sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCounts {
    pub files: usize,
    pub symbols: usize,
    pub lexical_docs: u64,
}

/// Run the stats command
///
/// * `prometheus` - If true, output in Prometheus text format
pub async fn run(prometheus: bool) -> Result<()> {
    let root = env::current_dir()?;

    if !Config::is_initialized(&root) {
        bail!("codesift has no index here. Run 'codesift index' first.");
    }

    let workspace = Workspace::open(&root)?;
    let counts = index_counts(&workspace).await?;

    // Gauges are process-local; refresh them from the stores
    INDEXED_FILES.set(counts.files as f64);
    INDEXED_SYMBOLS.set(counts.symbols as f64);

    if prometheus {
        print!("{}", gather_metrics());
        return Ok(());
    }

    print_human_readable(&workspace, counts);
    Ok(())
}

pub async fn index_counts(workspace: &Workspace) -> Result<IndexCounts> {
    Ok(IndexCounts {
        files: workspace.symbols.file_count().await?,
        symbols: workspace.symbols.symbol_count().await?,
        lexical_docs: workspace.lexical.num_docs(),
    })
}

fn print_human_readable(workspace: &Workspace, counts: IndexCounts) {
    let snapshot = MetricSnapshot::capture();

    println!("codesift Index Statistics");
    println!("=========================\n");

    println!("Index Contents:");
    println!("  Total files:    {}", counts.files);
    println!("  Total symbols:  {}", counts.symbols);
    println!("  Lexical docs:   {}", counts.lexical_docs);
    println!();

    println!("Search Metrics:");
    println!("  Total requests:     {:.0}", snapshot.search_requests_total);
    if snapshot.search_requests_total > 0.0 {
        println!("  Average latency:    {:.3}s", snapshot.search_latency_avg);
        println!("  Average results:    {:.1}", snapshot.search_results_avg);
        println!("  Semantic fallbacks: {:.0}", snapshot.semantic_fallbacks_total);
    }
    println!();

    println!("Embedding Metrics:");
    println!("  Total requests:   {:.0}", snapshot.embedding_requests_total);
    if snapshot.embedding_requests_total > 0.0 {
        println!("  Average latency:  {:.3}s", snapshot.embedding_latency_avg);
    }
    println!();

    let config = &workspace.config;
    println!("Storage:");
    println!("  Symbols: {}", config.symbols_path(&workspace.root).display());
    println!("  Lexical: {}", config.lexical_path(&workspace.root).display());
    println!("  Vectors: {}", config.vectors_path(&workspace.root).display());
}
