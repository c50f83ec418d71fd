//! Tree-sitter parser pool.
//!
//! Parsers are created lazily per language and reused. A pool is owned by one
//! worker; parallel extraction gives each rayon worker its own pool.

use std::collections::HashMap;

use tracing::debug;
use tree_sitter::{Language, Parser, Tree};

pub struct ParserPool {
    parsers: HashMap<&'static str, Parser>,
    languages: HashMap<&'static str, Language>,
}

impl ParserPool {
    pub fn new() -> Self {
        let mut pool = Self {
            parsers: HashMap::new(),
            languages: HashMap::new(),
        };

        pool.register_language("c", tree_sitter_c::LANGUAGE.into());
        pool.register_language("cpp", tree_sitter_cpp::LANGUAGE.into());
        pool.register_language("python", tree_sitter_python::LANGUAGE.into());

        pool
    }

    fn register_language(&mut self, id: &'static str, language: Language) {
        self.languages.insert(id, language);
    }

    /// Get a parser for the given language, creating it on first access.
    pub fn get_parser(&mut self, language: &str) -> Option<&mut Parser> {
        let (&id, ts_language) = self.languages.get_key_value(language)?;

        if !self.parsers.contains_key(id) {
            let mut parser = Parser::new();
            if let Err(e) = parser.set_language(ts_language) {
                debug!("Failed to set language '{}' for parser: {:?}", language, e);
                return None;
            }
            self.parsers.insert(id, parser);
        }

        self.parsers.get_mut(id)
    }

    /// Parse `content` with the grammar for `language`.
    ///
    /// Returns `None` when the language is unknown or the parser gives up.
    /// Syntax errors do not make this fail: they show up as `ERROR` nodes.
    pub fn parse(&mut self, language: &str, content: &str) -> Option<Tree> {
        let parser = self.get_parser(language)?;
        parser.parse(content, None)
    }

    pub fn supports(&self, language: &str) -> bool {
        self.languages.contains_key(language)
    }

    pub fn supported_languages(&self) -> Vec<&'static str> {
        let mut languages: Vec<&'static str> = self.languages.keys().copied().collect();
        languages.sort_unstable();
        languages
    }

    /// Map a file extension to a language tag.
    ///
    /// `.h` is treated as C; C++ headers use `.hpp`, `.hh`, or `.hxx`.
    pub fn detect_language_from_extension(ext: &str) -> Option<&'static str> {
        match ext {
            "py" | "pyi" => Some("python"),
            "c" | "h" => Some("c"),
            "cc" | "cxx" | "cpp" | "c++" | "hpp" | "hxx" | "h++" | "hh" => Some("cpp"),
            _ => None,
        }
    }
}

impl Default for ParserPool {
    fn default() -> Self {
        Self::new()
    }
}
