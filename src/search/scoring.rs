//! Name and structure sub-scores for hybrid ranking

use crate::symbol::SymbolKind;

/// Name score for a query whose camelCase tokens contain the name's, or vice versa
const TOKEN_MATCH_SCORE: f32 = 0.7;

/// Split an identifier into lowercase sub-tokens.
///
/// Breaks on `_`, `-`, other non-alphanumerics, lower-to-upper transitions,
/// and the end of an acronym: `HTTPServerConfig` gives `http`, `server`, `config`.
pub fn camel_tokens(identifier: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in identifier.split(|c: char| !c.is_alphanumeric()) {
        let chars: Vec<char> = word.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0 && c.is_uppercase() && {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            };
            if boundary && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            current.extend(c.to_lowercase());
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens
}

/// Levenshtein distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// `1 - distance / max(len)`, 0 for two empty strings
pub fn edit_similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein(a, b) as f32 / longest as f32
}

/// 0.7 when the token-normalised forms contain one another, else 0.0.
///
/// Sharing some tokens is not enough: `load user config` and `saveUserConfig`
/// score 0.
pub fn camel_token_score(query: &str, name: &str) -> f32 {
    let query_joined = camel_tokens(query).concat();
    let name_joined = camel_tokens(name).concat();
    if query_joined.is_empty() || name_joined.is_empty() {
        return 0.0;
    }

    if query_joined.contains(&name_joined) || name_joined.contains(&query_joined) {
        TOKEN_MATCH_SCORE
    } else {
        0.0
    }
}

/// How well a symbol name answers the query, in [0, 1]
pub fn name_score(query: &str, name: &str) -> f32 {
    let (query, name) = (query.trim(), name.trim());
    let query_lower = query.to_lowercase();
    let name_lower = name.to_lowercase();
    if query_lower.is_empty() || name_lower.is_empty() {
        return 0.0;
    }
    if query_lower == name_lower {
        return 1.0;
    }
    if name_lower.contains(&query_lower) || query_lower.contains(&name_lower) {
        return 0.8;
    }
    // camelCase boundaries only survive in the original spelling
    edit_similarity(&query_lower, &name_lower).max(camel_token_score(query, name))
}

/// The parts of a symbol structure scoring looks at
#[derive(Debug, Clone, Copy)]
pub struct StructuralFacts<'a> {
    pub kind: SymbolKind,
    pub file_path: &'a str,
    pub language: &'a str,
    pub line_span: usize,
}

/// Base score for being found structurally, plus bonuses for the query naming
/// the symbol's kind or language, the path containing the query, and size.
pub fn structure_score(query: &str, facts: StructuralFacts<'_>) -> f32 {
    let query = query.trim().to_lowercase();
    let words: Vec<&str> = query
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|w| !w.is_empty())
        .collect();

    let mut score = 0.5;

    let kind = facts.kind.as_str();
    if words.contains(&kind) || query.contains(&kind.replace('_', " ")) {
        score += 0.2;
    }
    if !query.is_empty() && facts.file_path.to_lowercase().contains(&query) {
        score += 0.15;
    }
    if language_named(&words, facts.language) {
        score += 0.1;
    }
    score += 0.05 * facts.line_span.min(100) as f32 / 100.0;

    score.min(1.0)
}

fn language_named(words: &[&str], language: &str) -> bool {
    let aliases: &[&str] = match language {
        "cpp" => &["cpp", "c++"],
        "python" => &["python", "py"],
        other => return words.contains(&other),
    };
    aliases.iter().any(|alias| words.contains(alias))
}
