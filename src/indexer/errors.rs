//! Per-file error collection during indexing

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Stage where a file failed
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ProcessingStage {
    FileRead,
    Parsing,
    Extraction,
    Storage,
    Embedding,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::FileRead => write!(f, "File Read"),
            ProcessingStage::Parsing => write!(f, "Parsing"),
            ProcessingStage::Extraction => write!(f, "Extraction"),
            ProcessingStage::Storage => write!(f, "Storage"),
            ProcessingStage::Embedding => write!(f, "Embedding"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileError {
    pub path: PathBuf,
    pub error: String,
    pub stage: ProcessingStage,
}

/// Shared sink for errors from rayon workers and the storage loop
#[derive(Clone, Default)]
pub struct ErrorCollector {
    errors: Arc<Mutex<Vec<FileError>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FileError>> {
        self.errors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, path: PathBuf, error: impl std::fmt::Display, stage: ProcessingStage) {
        self.lock().push(FileError {
            path,
            error: error.to_string(),
            stage,
        });
    }

    pub fn error_count(&self) -> usize {
        self.lock().len()
    }

    pub fn count_in(&self, stage: ProcessingStage) -> usize {
        self.lock().iter().filter(|e| e.stage == stage).count()
    }

    /// All errors, ordered by stage then path
    pub fn take(&self) -> Vec<FileError> {
        let mut errors = std::mem::take(&mut *self.lock());
        errors.sort_by(|a, b| a.stage.cmp(&b.stage).then_with(|| a.path.cmp(&b.path)));
        errors
    }
}

/// Errors grouped by stage for display
pub struct ErrorReport {
    pub total_errors: usize,
    pub by_stage: BTreeMap<ProcessingStage, Vec<FileError>>,
}

impl ErrorReport {
    pub fn from_errors(errors: &[FileError]) -> Self {
        let mut by_stage: BTreeMap<ProcessingStage, Vec<FileError>> = BTreeMap::new();
        for error in errors {
            by_stage.entry(error.stage).or_default().push(error.clone());
        }
        Self {
            total_errors: errors.len(),
            by_stage,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Print up to five examples per stage to stdout
    pub fn print_summary(&self) {
        if !self.has_errors() {
            return;
        }

        println!("⚠️  {} files had problems", self.total_errors);
        for (stage, errors) in &self.by_stage {
            println!("  {}: {} errors", stage, errors.len());
            for error in errors.iter().take(5) {
                println!("    - {}: {}", error.path.display(), error.error);
            }
            if errors.len() > 5 {
                println!("    ... and {} more", errors.len() - 5);
            }
        }
    }
}
