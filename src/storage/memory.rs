//! In-process stores.
//!
//! The symbol store can be snapshotted to a JSON file and loaded back; the
//! vector store is rebuilt by re-indexing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use super::{cosine_similarity, SymbolStore, VectorMatch, VectorRecord, VectorStore};
use crate::symbol::{Relationship, Symbol, SymbolId};

#[derive(Default)]
struct SymbolTables {
    symbols: HashMap<SymbolId, Symbol>,
    files: HashMap<String, FileEntry>,
}

#[derive(Default)]
struct FileEntry {
    symbol_ids: Vec<SymbolId>,
    relationships: Vec<Relationship>,
}

/// On-disk form of [`MemorySymbolStore`]
#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    symbols: Vec<Symbol>,
    relationships: Vec<Relationship>,
}

/// Symbol store backed by hash maps behind one lock
#[derive(Default)]
pub struct MemorySymbolStore {
    tables: RwLock<SymbolTables>,
}

impl MemorySymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`MemorySymbolStore::persist`]; a missing
    /// file gives an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let store = Self::new();
        if !path.exists() {
            debug!("No symbol snapshot at {:?}, starting empty", path);
            return Ok(store);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read symbol snapshot {:?}", path))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse symbol snapshot {:?}", path))?;

        {
            let mut tables = store.write();
            for symbol in snapshot.symbols {
                tables
                    .files
                    .entry(symbol.file_path.clone())
                    .or_default()
                    .symbol_ids
                    .push(symbol.id.clone());
                tables.symbols.insert(symbol.id.clone(), symbol);
            }
            for relationship in snapshot.relationships {
                tables
                    .files
                    .entry(relationship.file_path.clone())
                    .or_default()
                    .relationships
                    .push(relationship);
            }
            info!(
                symbols = tables.symbols.len(),
                files = tables.files.len(),
                "Loaded symbol snapshot"
            );
        }
        Ok(store)
    }

    /// Write every symbol and relationship to `path`, ordered by file and position
    pub fn persist(&self, path: &Path) -> Result<()> {
        let snapshot = {
            let tables = self.read();
            let mut files: Vec<&String> = tables.files.keys().collect();
            files.sort();

            let mut snapshot = Snapshot::default();
            for file in files {
                let entry = &tables.files[file];
                let mut symbols: Vec<Symbol> = entry
                    .symbol_ids
                    .iter()
                    .filter_map(|id| tables.symbols.get(id).cloned())
                    .collect();
                symbols.sort_by(|a, b| a.start_byte.cmp(&b.start_byte).then_with(|| a.id.cmp(&b.id)));
                snapshot.symbols.extend(symbols);
                snapshot.relationships.extend(entry.relationships.iter().cloned());
            }
            snapshot
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let content =
            serde_json::to_string(&snapshot).context("Failed to serialize symbol snapshot")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write symbol snapshot {:?}", path))?;

        debug!(symbols = snapshot.symbols.len(), "Persisted symbol snapshot to {:?}", path);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, SymbolTables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SymbolTables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SymbolStore for MemorySymbolStore {
    async fn get_by_id(&self, id: &SymbolId) -> Result<Option<Symbol>> {
        Ok(self.read().symbols.get(id).cloned())
    }

    async fn replace_file_symbols(
        &self,
        file_path: &str,
        symbols: Vec<Symbol>,
        relationships: Vec<Relationship>,
    ) -> Result<()> {
        let mut tables = self.write();
        if let Some(previous) = tables.files.remove(file_path) {
            for id in previous.symbol_ids {
                tables.symbols.remove(&id);
            }
        }

        if symbols.is_empty() && relationships.is_empty() {
            return Ok(());
        }

        let symbol_ids = symbols.iter().map(|s| s.id.clone()).collect();
        for symbol in symbols {
            tables.symbols.insert(symbol.id.clone(), symbol);
        }
        tables.files.insert(
            file_path.to_string(),
            FileEntry {
                symbol_ids,
                relationships,
            },
        );
        Ok(())
    }

    async fn symbols_in_file(&self, file_path: &str) -> Result<Vec<Symbol>> {
        let tables = self.read();
        Ok(tables
            .files
            .get(file_path)
            .map(|entry| {
                entry
                    .symbol_ids
                    .iter()
                    .filter_map(|id| tables.symbols.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn relationships_in_file(&self, file_path: &str) -> Result<Vec<Relationship>> {
        Ok(self
            .read()
            .files
            .get(file_path)
            .map(|entry| entry.relationships.clone())
            .unwrap_or_default())
    }

    async fn symbol_count(&self) -> Result<usize> {
        Ok(self.read().symbols.len())
    }

    async fn file_count(&self) -> Result<usize> {
        Ok(self.read().files.len())
    }

    async fn indexed_files(&self) -> Result<Vec<String>> {
        let mut files: Vec<String> = self.read().files.keys().cloned().collect();
        files.sort();
        Ok(files)
    }
}

/// Brute-force cosine vector store
#[derive(Default)]
pub struct MemoryVectorStore {
    files: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn search(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorMatch>> {
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut matches: Vec<VectorMatch> = files
            .values()
            .flatten()
            .filter_map(|record| {
                let similarity = cosine_similarity(vector, &record.vector);
                let confidence = similarity.clamp(0.0, 1.0);
                (confidence >= threshold).then(|| VectorMatch {
                    symbol_id: record.symbol_id.clone(),
                    name: record.name.clone(),
                    file_path: record.file_path.clone(),
                    distance: 1.0 - similarity,
                    confidence,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.symbol_id.cmp(&b.symbol_id))
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn replace_file(&self, file_path: &str, records: Vec<VectorRecord>) -> Result<()> {
        let mut files = self.files.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if records.is_empty() {
            files.remove(file_path);
        } else {
            files.insert(file_path.to_string(), records);
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(files.values().map(Vec::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::layers::Layer;
    use crate::symbol::{Position, RelationshipKind, SymbolKind, SymbolSpan, Visibility};
    use tempfile::tempdir;

    fn symbol(file: &str, name: &str, line: usize) -> Symbol {
        Symbol::new(
            name,
            SymbolKind::Class,
            "python",
            file,
            SymbolSpan {
                start: Position::new(line, 0),
                end: Position::new(line + 3, 0),
                start_byte: line * 10,
                end_byte: line * 10 + 30,
            },
            Visibility::Public,
        )
    }

    fn record(file: &str, name: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord::for_symbol(&symbol(file, name, 1), vector)
    }

    #[tokio::test]
    async fn test_replace_file_symbols_drops_previous_set() {
        let store = MemorySymbolStore::new();
        let old = symbol("a.py", "Old", 1);
        let kept = symbol("b.py", "Kept", 1);
        store.replace_file_symbols("a.py", vec![old.clone()], vec![]).await.unwrap();
        store.replace_file_symbols("b.py", vec![kept.clone()], vec![]).await.unwrap();

        let new = symbol("a.py", "New", 5);
        let edge = Relationship::resolved(&new, &new, RelationshipKind::Calls, 6);
        store
            .replace_file_symbols("a.py", vec![new.clone()], vec![edge.clone()])
            .await
            .unwrap();

        assert!(store.get_by_id(&old.id).await.unwrap().is_none());
        assert_eq!(store.get_by_id(&new.id).await.unwrap(), Some(new.clone()));
        assert_eq!(store.get_by_id(&kept.id).await.unwrap(), Some(kept));
        assert_eq!(store.symbols_in_file("a.py").await.unwrap(), vec![new]);
        assert_eq!(store.relationships_in_file("a.py").await.unwrap(), vec![edge]);
        assert_eq!(store.symbol_count().await.unwrap(), 2);

        store.replace_file_symbols("a.py", vec![], vec![]).await.unwrap();
        assert_eq!(store.file_count().await.unwrap(), 1);
        assert_eq!(store.indexed_files().await.unwrap(), vec!["b.py".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("symbols.json");
        let store = MemorySymbolStore::new();
        let a = symbol("a.py", "Alpha", 1);
        let b = symbol("a.py", "Beta", 9);
        let edge = Relationship::unresolved(&a, "os", RelationshipKind::Imports, 1);
        store
            .replace_file_symbols("a.py", vec![a.clone(), b.clone()], vec![edge.clone()])
            .await
            .unwrap();
        store.persist(&path).unwrap();

        let loaded = MemorySymbolStore::load(&path).unwrap();
        assert_eq!(loaded.symbols_in_file("a.py").await.unwrap(), vec![a, b]);
        assert_eq!(loaded.relationships_in_file("a.py").await.unwrap(), vec![edge]);
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_is_empty() {
        let dir = tempdir().unwrap();
        let store = MemorySymbolStore::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(store.symbol_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_vector_search_orders_and_filters() {
        let store = MemoryVectorStore::new();
        store
            .replace_file(
                "a.py",
                vec![
                    record("a.py", "Same", vec![1.0, 0.0]),
                    record("a.py", "Near", vec![0.8, 0.6]),
                    record("a.py", "Opposite", vec![-1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let matches = store.search(&[1.0, 0.0], 10, 0.5).await.unwrap();
        let names: Vec<_> = matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Same", "Near"]);
        assert!(matches[0].distance.abs() < 1e-6);
        assert!((matches[1].confidence - 0.8).abs() < 1e-6);

        let limited = store.search(&[1.0, 0.0], 1, 0.0).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_find_cross_layer_entity_filters_by_name() {
        let store = MemoryVectorStore::new();
        store
            .replace_file("frontend/types.ts", vec![record("frontend/types.ts", "IUserDto", vec![0.6, 0.8])])
            .await
            .unwrap();
        store
            .replace_file("domain/invoice.py", vec![record("domain/invoice.py", "Invoice", vec![0.6, 0.8])])
            .await
            .unwrap();

        let hits = store.find_cross_layer_entity("User", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "IUserDto");
        assert_eq!(hits[0].layer, Layer::Frontend);
        assert_eq!(hits[0].confidence, 1.0);
    }
}
