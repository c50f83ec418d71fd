use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extraction::context::DEFAULT_MAX_DEPTH;

const CONFIG_DIR: &str = ".codesift";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// File extensions to index
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Patterns to ignore (in addition to .gitignore)
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Number of parallel extraction threads (None = rayon default)
    #[serde(default)]
    pub parallel_threads: Option<usize>,

    /// Deepest syntax nesting the extraction walk descends into
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Files larger than this are skipped
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_patterns: default_ignore_patterns(),
            parallel_threads: None,
            max_depth: default_max_depth(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["c", "h", "cc", "cpp", "cxx", "hpp", "hxx", "hh", "py", "pyi"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "target".to_string(),
        ".git".to_string(),
        "dist".to_string(),
        "build".to_string(),
        "__pycache__".to_string(),
        ".venv".to_string(),
        "vendor".to_string(),
        CONFIG_DIR.to_string(),
    ]
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024
}

/// Which embedding provider to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local ONNX model via fastembed
    #[default]
    FastEmbed,
    /// Deterministic feature hashing, no model needed
    Hash,
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingBackend::FastEmbed => write!(f, "fastembed"),
            EmbeddingBackend::Hash => write!(f, "hash"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Embedding model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Batch size for embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Vector size for the hash backend
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Where downloaded model weights are kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_model(),
            batch_size: default_batch_size(),
            dimension: default_dimension(),
            cache_dir: None,
        }
    }
}

fn default_model() -> String {
    "bge-small-en-v1.5".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_dimension() -> usize {
    384
}

/// Store locations, relative to `.codesift/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_symbols_path")]
    pub symbols_path: String,

    #[serde(default = "default_lexical_path")]
    pub lexical_path: String,

    #[serde(default = "default_vectors_path")]
    pub vectors_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            symbols_path: default_symbols_path(),
            lexical_path: default_lexical_path(),
            vectors_path: default_vectors_path(),
        }
    }
}

fn default_symbols_path() -> String {
    "symbols.json".to_string()
}

fn default_lexical_path() -> String {
    "lexical.index".to_string()
}

fn default_vectors_path() -> String {
    "vectors.lance".to_string()
}

/// Ranking weights and limits for hybrid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_name_weight")]
    pub name_weight: f32,

    #[serde(default = "default_structure_weight")]
    pub structure_weight: f32,

    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Minimum vector confidence for a semantic candidate
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,

    /// Default number of results to return
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Vector neighbours examined when mapping an entity across layers
    #[serde(default = "default_entity_neighbours")]
    pub entity_neighbours: usize,

    /// Bring up the embedder on the first semantic query instead of at startup
    #[serde(default = "default_lazy_init")]
    pub lazy_init: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            name_weight: default_name_weight(),
            structure_weight: default_structure_weight(),
            semantic_weight: default_semantic_weight(),
            semantic_threshold: default_semantic_threshold(),
            max_results: default_max_results(),
            entity_neighbours: default_entity_neighbours(),
            lazy_init: default_lazy_init(),
        }
    }
}

fn default_name_weight() -> f32 {
    0.3
}

fn default_structure_weight() -> f32 {
    0.3
}

fn default_semantic_weight() -> f32 {
    0.4
}

fn default_semantic_threshold() -> f32 {
    0.3
}

fn default_max_results() -> usize {
    20
}

fn default_entity_neighbours() -> usize {
    50
}

fn default_lazy_init() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write logs to rolling files
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// Also log to stderr
    #[serde(default = "default_logging_stderr")]
    pub stderr: bool,

    /// File log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log directory, relative to the project root unless absolute
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// hourly, daily, minutely, or never
    #[serde(default = "default_log_rotation")]
    pub rotation: String,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            stderr: default_logging_stderr(),
            level: default_log_level(),
            directory: default_log_directory(),
            rotation: default_log_rotation(),
            file_prefix: default_log_file_prefix(),
        }
    }
}

fn default_logging_enabled() -> bool {
    false
}

fn default_logging_stderr() -> bool {
    true
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("logs")
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

fn default_log_file_prefix() -> String {
    "codesift.log".to_string()
}

impl Config {
    /// Load configuration from the .codesift directory
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;

            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the .codesift directory
    pub fn save(&self, root: &Path) -> Result<()> {
        let config_dir = root.join(CONFIG_DIR);
        let config_path = config_dir.join(CONFIG_FILE);

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Get the path to the .codesift directory
    pub fn codesift_dir(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR)
    }

    pub fn symbols_path(&self, root: &Path) -> PathBuf {
        Self::codesift_dir(root).join(&self.storage.symbols_path)
    }

    pub fn lexical_path(&self, root: &Path) -> PathBuf {
        Self::codesift_dir(root).join(&self.storage.lexical_path)
    }

    pub fn vectors_path(&self, root: &Path) -> PathBuf {
        Self::codesift_dir(root).join(&self.storage.vectors_path)
    }

    /// Check if an index exists in the given directory
    pub fn is_initialized(root: &Path) -> bool {
        Self::codesift_dir(root).exists()
    }
}
