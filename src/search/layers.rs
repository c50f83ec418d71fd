//! Architectural layer heuristics for cross-layer entity analysis

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::scoring::camel_tokens;

/// Architectural layer a file belongs to, judged from its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Frontend,
    Api,
    Domain,
    Data,
    Database,
    Infrastructure,
    Unknown,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Frontend => "frontend",
            Layer::Api => "api",
            Layer::Domain => "domain",
            Layer::Data => "data",
            Layer::Database => "database",
            Layer::Infrastructure => "infrastructure",
            Layer::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checked top to bottom; the first layer with a matching token wins
const LAYER_TOKENS: &[(Layer, &[&str])] = &[
    (Layer::Frontend, &["frontend", "client", "ui"]),
    (Layer::Api, &["api", "controller", "endpoint"]),
    (Layer::Domain, &["domain", "model", "entity"]),
    (Layer::Data, &["data", "repository", "dal"]),
    (Layer::Database, &["database", "migration"]),
    (Layer::Infrastructure, &["infrastructure", "config"]),
];

/// Layer sets recognised as a named architecture, checked in order
const PATTERNS: &[(&[&str], &str)] = &[
    (&["frontend", "api", "domain"], "Clean Architecture"),
    (&["controller", "service", "repository"], "MVC Pattern"),
    (&["api", "domain", "data"], "Layered Architecture"),
];

pub const CUSTOM_ARCHITECTURE: &str = "Custom Architecture";

/// Below this mean confidence the entity's names are flagged as inconsistent
const CONSISTENCY_THRESHOLD: f32 = 0.5;

/// Lowercase words of a path: whole segments plus their camelCase parts
fn path_words(path: &str) -> Vec<String> {
    let mut words = Vec::new();
    for segment in path.split(['/', '\\', '.', '_', '-']) {
        if segment.is_empty() {
            continue;
        }
        words.push(segment.to_lowercase());
        for token in camel_tokens(segment) {
            if !words.contains(&token) {
                words.push(token);
            }
        }
    }
    words
}

/// Exact word or a simple plural of it
fn word_matches(word: &str, token: &str) -> bool {
    if word == token {
        return true;
    }
    if let Some(stem) = word.strip_suffix('s') {
        if stem == token {
            return true;
        }
    }
    match (word.strip_suffix("ies"), token.strip_suffix('y')) {
        (Some(word_stem), Some(token_stem)) => word_stem == token_stem,
        _ => false,
    }
}

/// Classify a file path into an architectural layer
pub fn detect_layer(path: &str) -> Layer {
    let words = path_words(path);
    let is_sql = path.to_lowercase().ends_with(".sql");

    for (layer, tokens) in LAYER_TOKENS {
        if *layer == Layer::Database && is_sql {
            return Layer::Database;
        }
        if tokens
            .iter()
            .any(|token| words.iter().any(|word| word_matches(word, token)))
        {
            return *layer;
        }
    }
    Layer::Unknown
}

/// Name the architecture implied by the set of layer labels present
pub fn detect_pattern<'a>(present: impl IntoIterator<Item = &'a str>) -> &'static str {
    let present: Vec<&str> = present.into_iter().collect();
    PATTERNS
        .iter()
        .find(|(required, _)| required.iter().all(|layer| present.contains(layer)))
        .map(|(_, name)| *name)
        .unwrap_or(CUSTOM_ARCHITECTURE)
}

/// Every advisory that applies to the entity's spread across layers
pub fn recommendations(
    entity_name: &str,
    layer_counts: &BTreeMap<Layer, usize>,
    total_confidence: f32,
) -> Vec<String> {
    let mut advice = Vec::new();
    let has = |layer: Layer| layer_counts.get(&layer).is_some_and(|count| *count > 0);

    if layer_counts.values().all(|count| *count == 0) {
        advice.push(format!(
            "No representations of '{}' were found; check the entity name or create it in the layers that need it",
            entity_name
        ));
    }
    if has(Layer::Api) && !has(Layer::Frontend) {
        advice.push(format!(
            "'{}' is exposed by the API but has no frontend type; add one to keep client and server in sync",
            entity_name
        ));
    }
    if has(Layer::Domain) && !has(Layer::Database) {
        advice.push(format!(
            "'{}' has a domain model but no database schema or migration",
            entity_name
        ));
    }
    if total_confidence < CONSISTENCY_THRESHOLD {
        advice.push(format!(
            "Matches for '{}' have low confidence ({:.2}); naming may be inconsistent across layers",
            entity_name, total_confidence
        ));
    }
    let populated = layer_counts.values().filter(|count| **count > 0).count();
    if populated == 1 {
        if let Some((layer, _)) = layer_counts.iter().find(|(_, count)| **count > 0) {
            advice.push(format!(
                "'{}' only appears in the {} layer; consider whether other layers need a representation",
                entity_name, layer
            ));
        }
    }
    advice
}
