pub mod cli;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod indexer;
pub mod logging;
pub mod metrics;
pub mod search;
pub mod storage;
pub mod symbol;

pub use config::Config;
pub use error::{EngineError, ExtractionError};
