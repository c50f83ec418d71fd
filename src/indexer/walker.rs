use ignore::WalkBuilder;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::IndexerConfig;

/// Walks the filesystem respecting .gitignore and custom ignore patterns
pub struct Walker {
    root: PathBuf,
    extensions: HashSet<String>,
    ignore_patterns: Vec<String>,
}

impl Walker {
    pub fn new(root: PathBuf, config: &IndexerConfig) -> Self {
        Self {
            root,
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            ignore_patterns: config.ignore_patterns.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source files under the root with an indexed extension.
    ///
    /// Honors .gitignore, skips hidden entries, and drops any path with a
    /// component equal to an ignore pattern.
    pub fn walk(&self) -> impl Iterator<Item = PathBuf> + '_ {
        let mut builder = WalkBuilder::new(&self.root);
        builder.git_ignore(true);
        builder.git_global(true);
        builder.git_exclude(true);
        builder.hidden(true);
        // Stable order keeps symbol store snapshots diffable
        builder.sort_by_file_path(|a, b| a.cmp(b));

        builder
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter(move |entry| !self.is_ignored(entry.path()))
            .filter(move |entry| self.has_indexed_extension(entry.path()))
            .map(|entry| entry.into_path())
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            self.ignore_patterns.iter().any(|pattern| *pattern == name)
        })
    }

    fn has_indexed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// Collect all walkable files into a Vec
    pub fn collect_files(&self) -> Vec<PathBuf> {
        self.walk().collect()
    }
}
