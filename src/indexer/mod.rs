pub mod errors;
pub mod pipeline;
pub mod walker;

pub use errors::{ErrorCollector, ErrorReport, FileError, ProcessingStage};
pub use pipeline::{relative_path, IndexReport, Indexer};
pub use walker::Walker;
