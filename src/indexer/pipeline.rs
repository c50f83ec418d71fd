//! Parallel indexing: extract with rayon, then store file by file.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::IndexerConfig;
use crate::error::ExtractionError;
use crate::extraction::{ExtractorRegistry, FileExtraction, ParserPool};
use crate::metrics::{
    INDEXED_FILES, INDEXED_SYMBOLS, INDEX_LATENCY, PARSE_FAILURES, RECOVERED_SYMBOLS,
    SKIPPED_NODES,
};
use crate::search::traits::LexicalIndex;
use crate::search::SemanticBackend;
use crate::storage::{SymbolStore, VectorRecord};

use super::errors::{ErrorCollector, FileError, ProcessingStage};
use super::walker::Walker;

const DEFAULT_EMBED_BATCH: usize = 32;

/// Outcome of one indexing run
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub symbols: usize,
    pub relationships: usize,
    pub parse_failures: usize,
    pub skipped_nodes: usize,
    pub recovered_symbols: usize,
    pub embedded_symbols: usize,
    /// Previously indexed files no longer found on disk
    pub removed_files: usize,
    pub errors: Vec<FileError>,
    pub duration: Duration,
}

/// One file after extraction, ready to store
struct ParsedFile {
    relative: String,
    extraction: FileExtraction,
}

/// Keeps the symbol store, the lexical index, and (optionally) the vector
/// store in step for every file it touches.
pub struct Indexer {
    registry: Arc<ExtractorRegistry>,
    symbols: Arc<dyn SymbolStore>,
    lexical: Arc<dyn LexicalIndex>,
    semantic: Option<SemanticBackend>,
    config: IndexerConfig,
    embed_batch_size: usize,
    show_progress: bool,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        symbols: Arc<dyn SymbolStore>,
        lexical: Arc<dyn LexicalIndex>,
    ) -> Self {
        let registry = ExtractorRegistry::new().with_max_depth(config.max_depth);
        Self {
            registry: Arc::new(registry),
            symbols,
            lexical,
            semantic: None,
            config,
            embed_batch_size: DEFAULT_EMBED_BATCH,
            show_progress: false,
        }
    }

    /// Also embed every symbol into `backend.vectors`
    pub fn with_semantic(mut self, backend: SemanticBackend, batch_size: usize) -> Self {
        self.semantic = Some(backend);
        self.embed_batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Walk `root` and index every matching file.
    ///
    /// Files stored by an earlier run that the walk no longer finds are
    /// removed from every store.
    pub async fn index_directory(&self, root: &Path) -> Result<IndexReport> {
        let walker = Walker::new(root.to_path_buf(), &self.config);
        let files = walker.collect_files();
        info!("Found {} files to index under {}", files.len(), root.display());

        let walked: HashSet<String> = files.iter().map(|p| relative_path(root, p)).collect();
        let vanished: Vec<String> = self
            .symbols
            .indexed_files()
            .await
            .context("Failed to list indexed files")?
            .into_iter()
            .filter(|file| !walked.contains(file))
            .collect();

        self.run(root, files, vanished).await
    }

    /// Index `files`, storing paths relative to `root`.
    ///
    /// A file that fails to parse is stored with an empty symbol set so stale
    /// symbols from an earlier run disappear. Files not listed are left alone.
    pub async fn index_paths(&self, root: &Path, files: Vec<PathBuf>) -> Result<IndexReport> {
        self.run(root, files, Vec::new()).await
    }

    async fn run(
        &self,
        root: &Path,
        files: Vec<PathBuf>,
        vanished: Vec<String>,
    ) -> Result<IndexReport> {
        let start = Instant::now();
        let errors = ErrorCollector::new();

        let parsed = self.extract_all(root, files, &errors).await?;

        let mut report = IndexReport::default();
        let progress = self.progress_bar(parsed.len() as u64, "Storing");

        for file in parsed {
            progress.set_message(file.relative.clone());
            self.store_file(file, &errors, &mut report).await;
            progress.inc(1);
        }
        progress.finish_with_message("done");

        for relative in &vanished {
            if self.remove_file(relative, &errors).await {
                report.removed_files += 1;
            }
        }

        self.lexical
            .commit()
            .await
            .context("Failed to commit lexical index")?;

        report.parse_failures = errors.count_in(ProcessingStage::Parsing);
        report.errors = errors.take();
        report.duration = start.elapsed();

        INDEXED_FILES.set(self.symbols.file_count().await.unwrap_or(0) as f64);
        INDEXED_SYMBOLS.set(self.symbols.symbol_count().await.unwrap_or(0) as f64);
        SKIPPED_NODES.inc_by(report.skipped_nodes as f64);
        RECOVERED_SYMBOLS.inc_by(report.recovered_symbols as f64);
        INDEX_LATENCY.observe(report.duration.as_secs_f64());

        info!(
            files = report.files_indexed,
            removed = report.removed_files,
            symbols = report.symbols,
            errors = report.errors.len(),
            "Indexing finished in {:.2}s",
            report.duration.as_secs_f64()
        );

        Ok(report)
    }

    /// Read and extract every file on the rayon pool
    async fn extract_all(
        &self,
        root: &Path,
        files: Vec<PathBuf>,
        errors: &ErrorCollector,
    ) -> Result<Vec<ParsedFile>> {
        let registry = Arc::clone(&self.registry);
        let errors = errors.clone();
        let root = root.to_path_buf();
        let max_file_bytes = self.config.max_file_bytes;
        let threads = self.config.parallel_threads;
        let progress = self.progress_bar(files.len() as u64, "Parsing");

        let mut parsed = tokio::task::spawn_blocking(move || -> Result<Vec<ParsedFile>> {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if let Some(threads) = threads {
                builder = builder.num_threads(threads);
            }
            let pool = builder
                .build()
                .context("Failed to build extraction thread pool")?;

            let parsed = pool.install(|| {
                files
                    .par_iter()
                    .map_init(ParserPool::new, |parsers, path| {
                        let result =
                            extract_file(&registry, parsers, &root, path, max_file_bytes, &errors);
                        progress.inc(1);
                        result
                    })
                    .flatten()
                    .collect::<Vec<_>>()
            });
            progress.finish_and_clear();
            Ok(parsed)
        })
        .await
        .context("Extraction task panicked")??;

        parsed.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(parsed)
    }

    async fn store_file(&self, file: ParsedFile, errors: &ErrorCollector, report: &mut IndexReport) {
        let ParsedFile {
            relative,
            extraction,
        } = file;
        let path = PathBuf::from(&relative);

        report.skipped_nodes += extraction.skipped_count();
        report.recovered_symbols += extraction.recovered_count();

        if let Err(e) = self.lexical.replace_file(&relative, &extraction.symbols).await {
            warn!("Lexical index update failed for {}: {:#}", relative, e);
            errors.record(path.clone(), format!("{:#}", e), ProcessingStage::Storage);
        }

        if let Some(backend) = &self.semantic {
            let records = match self.embed_symbols(backend, &extraction).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("Embedding failed for {}: {:#}", relative, e);
                    errors.record(path.clone(), format!("{:#}", e), ProcessingStage::Embedding);
                    Vec::new()
                }
            };
            report.embedded_symbols += records.len();
            if let Err(e) = backend.vectors.replace_file(&relative, records).await {
                warn!("Vector store update failed for {}: {:#}", relative, e);
                errors.record(path.clone(), format!("{:#}", e), ProcessingStage::Storage);
            }
        }

        let symbol_count = extraction.symbols.len();
        let relationship_count = extraction.relationships.len();
        match self
            .symbols
            .replace_file_symbols(&relative, extraction.symbols, extraction.relationships)
            .await
        {
            Ok(()) => {
                report.files_indexed += 1;
                report.symbols += symbol_count;
                report.relationships += relationship_count;
            }
            Err(e) => {
                warn!("Symbol store update failed for {}: {:#}", relative, e);
                errors.record(path, format!("{:#}", e), ProcessingStage::Storage);
            }
        }
    }

    /// Drop a file that is gone from disk from every store
    async fn remove_file(&self, relative: &str, errors: &ErrorCollector) -> bool {
        let path = PathBuf::from(relative);
        let mut removed = true;

        if let Err(e) = self.lexical.replace_file(relative, &[]).await {
            warn!("Lexical index removal failed for {}: {:#}", relative, e);
            errors.record(path.clone(), format!("{:#}", e), ProcessingStage::Storage);
            removed = false;
        }

        if let Some(backend) = &self.semantic {
            if let Err(e) = backend.vectors.replace_file(relative, Vec::new()).await {
                warn!("Vector store removal failed for {}: {:#}", relative, e);
                errors.record(path.clone(), format!("{:#}", e), ProcessingStage::Storage);
                removed = false;
            }
        }

        if let Err(e) = self
            .symbols
            .replace_file_symbols(relative, Vec::new(), Vec::new())
            .await
        {
            warn!("Symbol store removal failed for {}: {:#}", relative, e);
            errors.record(path, format!("{:#}", e), ProcessingStage::Storage);
            removed = false;
        }

        if removed {
            debug!("Removed deleted file {}", relative);
        }
        removed
    }

    async fn embed_symbols(
        &self,
        backend: &SemanticBackend,
        extraction: &FileExtraction,
    ) -> Result<Vec<VectorRecord>> {
        let mut records = Vec::with_capacity(extraction.symbols.len());
        for batch in extraction.symbols.chunks(self.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.embedding_text()).collect();
            let vectors = backend.embedder.embed(&texts).await?;
            anyhow::ensure!(
                vectors.len() == batch.len(),
                "embedder returned {} vectors for {} symbols",
                vectors.len(),
                batch.len()
            );
            records.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(symbol, vector)| VectorRecord::for_symbol(symbol, vector)),
            );
        }
        Ok(records)
    }

    fn progress_bar(&self, len: u64, label: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {prefix}: [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_prefix(label);
        bar
    }
}

/// Path relative to `root` with `/` separators
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn extract_file(
    registry: &ExtractorRegistry,
    parsers: &mut ParserPool,
    root: &Path,
    path: &Path,
    max_file_bytes: u64,
    errors: &ErrorCollector,
) -> Option<ParsedFile> {
    let relative = relative_path(root, path);

    let language = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ParserPool::detect_language_from_extension(&ext.to_lowercase()));
    let Some(language) = language else {
        debug!("Skipping {}: no language for extension", relative);
        return None;
    };

    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > max_file_bytes => {
            debug!("Skipping {}: {} bytes exceeds limit", relative, meta.len());
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            errors.record(path.to_path_buf(), e, ProcessingStage::FileRead);
            return None;
        }
    }

    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            errors.record(path.to_path_buf(), e, ProcessingStage::FileRead);
            return None;
        }
    };

    match registry.extract_source(parsers, &relative, language, &source) {
        Ok(extraction) => Some(ParsedFile {
            relative,
            extraction,
        }),
        Err(e @ ExtractionError::Parse { .. }) => {
            PARSE_FAILURES.inc();
            errors.record(path.to_path_buf(), &e, ProcessingStage::Parsing);
            Some(ParsedFile {
                relative,
                extraction: FileExtraction::default(),
            })
        }
        Err(e) => {
            errors.record(path.to_path_buf(), &e, ProcessingStage::Extraction);
            None
        }
    }
}
