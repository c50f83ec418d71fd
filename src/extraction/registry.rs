//! Registry of language extractors keyed by language tag.

use std::collections::HashMap;

use tracing::warn;

use crate::error::ExtractionError;

use super::context::DEFAULT_MAX_DEPTH;
use super::languages::{CFamilyExtractor, Dialect, PythonExtractor};
use super::{ExtractionContext, FileExtraction, LanguageExtractor, ParserPool};

pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn LanguageExtractor>>,
    max_depth: usize,
}

impl ExtractorRegistry {
    /// Create a registry with all built-in extractors.
    pub fn new() -> Self {
        let mut registry = Self {
            extractors: HashMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        };

        registry.register(Box::new(CFamilyExtractor::new(Dialect::C)));
        registry.register(Box::new(CFamilyExtractor::new(Dialect::Cpp)));
        registry.register(Box::new(PythonExtractor::new()));

        registry
    }

    /// Traversal depth limit given to every extraction context
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn get(&self, language: &str) -> Option<&dyn LanguageExtractor> {
        self.extractors.get(language).map(|e| e.as_ref())
    }

    /// Register an extractor under its own language tag, replacing any previous one.
    pub fn register(&mut self, extractor: Box<dyn LanguageExtractor>) {
        let lang_id = extractor.language_id().to_string();
        self.extractors.insert(lang_id, extractor);
    }

    pub fn supported_languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.extractors.keys().map(|s| s.as_str()).collect();
        languages.sort_unstable();
        languages
    }

    /// Parse and extract one file.
    ///
    /// A fresh [`ExtractionContext`] is created for the call.
    pub fn extract_source(
        &self,
        pool: &mut ParserPool,
        file_path: &str,
        language: &str,
        source: &str,
    ) -> Result<FileExtraction, ExtractionError> {
        let extractor = self
            .get(language)
            .ok_or_else(|| ExtractionError::UnsupportedLanguage(language.to_string()))?;

        let tree = pool.parse(language, source).ok_or_else(|| {
            warn!(file = file_path, language, "Parser returned no tree");
            ExtractionError::Parse {
                path: file_path.to_string(),
                language: language.to_string(),
            }
        })?;

        let mut ctx =
            ExtractionContext::new(file_path, language, source).with_max_depth(self.max_depth);
        Ok(extractor.extract(&tree, &mut ctx))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
