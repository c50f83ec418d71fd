use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codesift")]
#[command(author, version, about = "Symbol extraction and hybrid code search")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .codesift/config.toml with default settings
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Extract symbols and (re)build the indexes
    Index {
        /// Project root to index (defaults to the current directory)
        path: Option<PathBuf>,

        /// Drop existing indexes before indexing
        #[arg(long)]
        clear: bool,

        /// Skip embeddings; only the symbol store and lexical index are built
        #[arg(long)]
        no_embed: bool,
    },

    /// Search indexed symbols
    Search {
        /// Search query
        query: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only use the lexical index
        #[arg(long, conflicts_with = "semantic_only")]
        structural_only: bool,

        /// Only use embedding similarity
        #[arg(long)]
        semantic_only: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find one entity's representations across architectural layers
    Entity {
        /// Entity name, e.g. "User"
        name: String,

        /// Vector neighbours to examine (defaults to search.entity_neighbours)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics and metrics
    Stats {
        /// Output in Prometheus format
        #[arg(long)]
        prometheus: bool,
    },
}
