use anyhow::{anyhow, bail, Context, Result};
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{VectorMatch, VectorRecord, VectorStore};
use crate::symbol::SymbolId;

const TABLE_NAME: &str = "symbol_vectors";

/// LanceDB table of symbol embeddings, searched by cosine distance
pub struct LanceVectorStore {
    db: Connection,
    db_path: PathBuf,
    dimension: i32,
}

impl LanceVectorStore {
    /// Create or open a LanceDB database at the given path
    pub async fn new(path: &Path, dimension: usize) -> Result<Self> {
        let db_path = path.to_path_buf();
        let path_str = path.to_string_lossy();

        info!("Opening LanceDB at: {}", path_str);

        let db = connect(&path_str)
            .execute()
            .await
            .with_context(|| format!("Failed to connect to LanceDB at {}", path_str))?;

        let dimension = i32::try_from(dimension)
            .with_context(|| format!("Embedding dimension {} is too large", dimension))?;

        Ok(Self {
            db,
            db_path,
            dimension,
        })
    }

    async fn get_or_create_table(&self) -> Result<Table> {
        let table_names = self.db.table_names().execute().await?;

        if table_names.iter().any(|name| name == TABLE_NAME) {
            self.db
                .open_table(TABLE_NAME)
                .execute()
                .await
                .with_context(|| format!("Failed to open table {}", TABLE_NAME))
        } else {
            debug!("Creating new table: {}", TABLE_NAME);
            let batches = RecordBatchIterator::new(vec![], Arc::new(self.table_schema()));
            self.db
                .create_table(TABLE_NAME, Box::new(batches))
                .execute()
                .await
                .with_context(|| format!("Failed to create table {}", TABLE_NAME))
        }
    }

    fn table_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("symbol_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("kind", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("language", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    fn records_to_batch(&self, records: &[VectorRecord]) -> Result<RecordBatch> {
        if let Some(bad) = records
            .iter()
            .find(|r| r.vector.len() != self.dimension as usize)
        {
            bail!(
                "Vector for {} has {} dimensions, table expects {}",
                bad.symbol_id,
                bad.vector.len(),
                self.dimension
            );
        }

        let ids: Vec<&str> = records.iter().map(|r| r.symbol_id.as_str()).collect();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let kinds: Vec<&str> = records.iter().map(|r| r.kind.as_str()).collect();
        let file_paths: Vec<&str> = records.iter().map(|r| r.file_path.as_str()).collect();
        let languages: Vec<&str> = records.iter().map(|r| r.language.as_str()).collect();

        let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            records
                .iter()
                .map(|r| Some(r.vector.iter().map(|&v| Some(v)))),
            self.dimension,
        );

        RecordBatch::try_new(
            Arc::new(self.table_schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(names)),
                Arc::new(StringArray::from(kinds)),
                Arc::new(StringArray::from(file_paths)),
                Arc::new(StringArray::from(languages)),
                Arc::new(vectors),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// Drop the table and everything in it
    pub async fn clear(&self) -> Result<()> {
        let table_names = self.db.table_names().execute().await?;
        if table_names.iter().any(|name| name == TABLE_NAME) {
            self.db
                .drop_table(TABLE_NAME)
                .await
                .context("Failed to drop symbol vector table")?;
        }
        info!("Cleared vector store at {:?}", self.db_path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("Missing {} column", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn search(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let table = self.get_or_create_table().await?;

        let results = table
            .vector_search(vector.to_vec())
            .context("Failed to create vector search query")?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .context("Failed to collect search results")?;

        let mut matches = Vec::new();
        for batch in batches {
            let ids = string_column(&batch, "symbol_id")?;
            let names = string_column(&batch, "name")?;
            let file_paths = string_column(&batch, "file_path")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let distance = distances.value(i);
                let confidence = (1.0 - distance).clamp(0.0, 1.0);
                if confidence < threshold {
                    continue;
                }
                matches.push(VectorMatch {
                    symbol_id: SymbolId::from_raw(ids.value(i)),
                    name: names.value(i).to_string(),
                    file_path: file_paths.value(i).to_string(),
                    distance,
                    confidence,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.symbol_id.cmp(&b.symbol_id))
        });
        Ok(matches)
    }

    async fn replace_file(&self, file_path: &str, records: Vec<VectorRecord>) -> Result<()> {
        let table = self.get_or_create_table().await?;

        table
            .delete(&format!("file_path = '{}'", file_path.replace('\'', "''")))
            .await
            .with_context(|| format!("Failed to delete vectors for file: {}", file_path))?;

        if records.is_empty() {
            return Ok(());
        }

        let batch = self.records_to_batch(&records)?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], Arc::new(self.table_schema()));
        table
            .add(Box::new(batches))
            .execute()
            .await
            .with_context(|| format!("Failed to insert vectors for file: {}", file_path))?;

        debug!(file = file_path, vectors = records.len(), "Replaced file vectors");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let table = self.get_or_create_table().await?;
        table
            .count_rows(None)
            .await
            .context("Failed to count vectors")
    }
}
