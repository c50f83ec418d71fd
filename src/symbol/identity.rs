//! Deterministic symbol identity

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters kept from the SHA-256 digest
const ID_HEX_LEN: usize = 32;

/// Prefix marking a placeholder id for a relationship target that was not found
const UNRESOLVED_PREFIX: &str = "unresolved:";

/// Stable identifier of a symbol.
///
/// Derived from `(file_path, name, start_line, start_column)`, so re-extracting
/// unchanged source produces the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    /// Compute the id of a symbol at a given position
    pub fn derive(file_path: &str, name: &str, start_line: usize, start_column: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(start_line.to_le_bytes());
        hasher.update(start_column.to_le_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(ID_HEX_LEN);
        for byte in digest.iter().take(ID_HEX_LEN / 2) {
            hex.push_str(&format!("{:02x}", byte));
        }
        Self(hex)
    }

    /// Placeholder id for a target that could not be resolved in the current file
    pub fn unresolved(name: &str) -> Self {
        Self(format!("{}{}", UNRESOLVED_PREFIX, name))
    }

    /// Wrap an id read back from storage
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_unresolved(&self) -> bool {
        self.0.starts_with(UNRESOLVED_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SymbolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Line/column position inside a file (1-based line, 0-based column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Convert a tree-sitter point (0-based row) into a position
    pub fn from_point(point: tree_sitter::Point) -> Self {
        Self {
            line: point.row + 1,
            column: point.column,
        }
    }
}

/// Compute the 1-based line and 0-based column of a byte offset in `source`
pub fn position_at(source: &str, byte_offset: usize) -> Position {
    let offset = byte_offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = match before.iter().rposition(|&b| b == b'\n') {
        Some(newline) => offset - newline - 1,
        None => offset,
    };
    Position { line, column }
}
