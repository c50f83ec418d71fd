use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use codesift::cli::{Cli, Commands};
use codesift::commands::search::SearchMode;
use codesift::config::Config;
use codesift::logging::{init_early_logging, init_logging};
use codesift::metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_root = match &cli.command {
        Commands::Index {
            path: Some(path), ..
        } => path.clone(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    // The guard must live until exit so buffered log lines are flushed
    let _logging_guard = match Config::load(&project_root) {
        Ok(config) => Some(init_logging(&config.logging, &project_root)?),
        Err(e) => {
            init_early_logging();
            tracing::warn!("Using default configuration: {:#}", e);
            None
        }
    };

    tracing::debug!("Project root: {}", project_root.display());
    metrics::register_metrics();

    match cli.command {
        Commands::Init { force } => {
            codesift::commands::init::run(force).await?;
        }
        Commands::Index {
            path,
            clear,
            no_embed,
        } => {
            codesift::commands::index::run(path, clear, no_embed).await?;
        }
        Commands::Search {
            query,
            limit,
            structural_only,
            semantic_only,
            json,
        } => {
            let mode = SearchMode::from_flags(structural_only, semantic_only);
            codesift::commands::search::run(&query, limit, mode, json).await?;
        }
        Commands::Entity { name, limit, json } => {
            codesift::commands::entity::run(&name, limit, json).await?;
        }
        Commands::Stats { prometheus } => {
            codesift::commands::stats::run(prometheus).await?;
        }
    }

    Ok(())
}
