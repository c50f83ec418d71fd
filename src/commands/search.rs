use anyhow::Result;
use std::env;
use tracing::warn;

use crate::error::EngineError;
use crate::search::{RankedResult, SearchOptions};

use super::Workspace;

/// Which candidate sources a search uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Hybrid,
    StructuralOnly,
    SemanticOnly,
}

impl SearchMode {
    pub fn from_flags(structural_only: bool, semantic_only: bool) -> Self {
        match (structural_only, semantic_only) {
            (true, _) => SearchMode::StructuralOnly,
            (false, true) => SearchMode::SemanticOnly,
            (false, false) => SearchMode::Hybrid,
        }
    }

    fn apply(self, options: &mut SearchOptions) {
        options.include_structural = self != SearchMode::SemanticOnly;
        options.include_semantic = self != SearchMode::StructuralOnly;
    }
}

/// Run the search command against the index in the current directory.
///
/// In hybrid mode an embedder that cannot be brought up downgrades the search
/// to structural results instead of failing.
pub async fn run(query: &str, limit: Option<usize>, mode: SearchMode, json: bool) -> Result<()> {
    let cwd = env::current_dir()?;
    let workspace = Workspace::open(&cwd)?;
    let engine = workspace.engine();

    let mut options = SearchOptions::from(&workspace.config.search);
    if let Some(limit) = limit {
        options.max_results = limit;
    }
    mode.apply(&mut options);

    let results = match engine.search(query, &options).await {
        Err(e @ (EngineError::Initialization(_) | EngineError::NotInitialized))
            if mode == SearchMode::Hybrid =>
        {
            warn!("Semantic search unavailable, using structural results: {}", e);
            options.include_semantic = false;
            engine.search(query, &options).await?
        }
        other => other?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found for: {}", query);
        println!("\nMake sure you have indexed the codebase with 'codesift index'");
        return Ok(());
    }

    println!("Found {} results for: \"{}\"\n", results.len(), query);
    for (i, result) in results.iter().enumerate() {
        println!("{}", format_result(i + 1, result));
    }

    Ok(())
}

fn format_result(rank: usize, result: &RankedResult) -> String {
    let score_pct = (result.score * 100.0).round() as i32;
    let mut out = format!(
        "{}. {} {} ({}) {}:{}-{} [score: {}%, {:?}]",
        rank,
        result.kind.as_str(),
        result.name,
        result.language,
        result.file_path,
        result.start_line,
        result.end_line,
        score_pct,
        result.search_method,
    );
    if let Some(signature) = &result.signature {
        out.push_str(&format!("\n   {}", signature));
    }
    out
}
