//! Tantivy index over symbol names.
//!
//! Each symbol is one document. The fuzzy pass matches query sub-tokens
//! against the name's camelCase parts, both as prefixes and within a small
//! edit distance, and against signature and doc text. The exact pass matches
//! the whole lowercased name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value as _, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use super::scoring::camel_tokens;
use super::traits::{LexicalHit, LexicalIndex};
use crate::symbol::{Symbol, SymbolId, SymbolKind};

const WRITER_HEAP_BYTES: usize = 50_000_000;

const NAME_TERM_BOOST: f32 = 2.0;
const DOC_BOOST: f32 = 0.5;

const FIELD_ID: &str = "symbol_id";
const FIELD_NAME: &str = "name";
const FIELD_NAME_EXACT: &str = "name_exact";
const FIELD_NAME_TERMS: &str = "name_terms";
const FIELD_KIND: &str = "kind";
const FIELD_LANGUAGE: &str = "language";
const FIELD_FILE_PATH: &str = "file_path";
const FIELD_START_LINE: &str = "start_line";
const FIELD_END_LINE: &str = "end_line";
const FIELD_SIGNATURE: &str = "signature";
const FIELD_DOC: &str = "doc";

#[derive(Clone)]
struct SymbolSchema {
    schema: Schema,
    symbol_id: Field,
    name: Field,
    name_exact: Field,
    name_terms: Field,
    kind: Field,
    language: Field,
    file_path: Field,
    start_line: Field,
    end_line: Field,
    signature: Field,
    doc: Field,
}

impl SymbolSchema {
    fn new() -> Self {
        let mut builder = Schema::builder();

        let symbol_id = builder.add_text_field(FIELD_ID, STRING | STORED);
        let name = builder.add_text_field(FIELD_NAME, STORED);
        let name_exact = builder.add_text_field(FIELD_NAME_EXACT, STRING);
        let name_terms = builder.add_text_field(FIELD_NAME_TERMS, TEXT);
        let kind = builder.add_text_field(FIELD_KIND, STRING | STORED);
        let language = builder.add_text_field(FIELD_LANGUAGE, STRING | STORED);
        let file_path = builder.add_text_field(FIELD_FILE_PATH, STRING | STORED);
        let start_line = builder.add_u64_field(FIELD_START_LINE, STORED);
        let end_line = builder.add_u64_field(FIELD_END_LINE, STORED);
        let signature = builder.add_text_field(FIELD_SIGNATURE, TEXT | STORED);
        let doc = builder.add_text_field(FIELD_DOC, TEXT);

        Self {
            schema: builder.build(),
            symbol_id,
            name,
            name_exact,
            name_terms,
            kind,
            language,
            file_path,
            start_line,
            end_line,
            signature,
            doc,
        }
    }
}

/// Lexical symbol index backed by tantivy, in RAM or on disk.
pub struct TantivySymbolIndex {
    schema: SymbolSchema,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    location: Option<PathBuf>,
}

impl TantivySymbolIndex {
    /// Create or open an index in the given directory.
    pub fn open(path: &Path) -> Result<Self> {
        let schema = SymbolSchema::new();

        let index = if path.exists() {
            info!("Opening existing lexical index at {:?}", path);
            Index::open_in_dir(path)
                .with_context(|| format!("Failed to open lexical index at {:?}", path))?
        } else {
            info!("Creating new lexical index at {:?}", path);
            std::fs::create_dir_all(path)
                .with_context(|| format!("Failed to create lexical index directory {:?}", path))?;
            Index::create_in_dir(path, schema.schema.clone())
                .with_context(|| format!("Failed to create lexical index at {:?}", path))?
        };

        Self::from_index(index, schema, Some(path.to_path_buf()))
    }

    /// Index that lives only as long as the value
    pub fn in_memory() -> Result<Self> {
        let schema = SymbolSchema::new();
        let index = Index::create_in_ram(schema.schema.clone());
        Self::from_index(index, schema, None)
    }

    fn from_index(index: Index, schema: SymbolSchema, location: Option<PathBuf>) -> Result<Self> {
        // A single indexing thread keeps document order stable between runs
        let writer = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;

        Ok(Self {
            schema,
            writer: Mutex::new(writer),
            reader,
            location,
        })
    }

    fn writer(&self) -> MutexGuard<'_, IndexWriter> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Number of committed symbol documents
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn clear(&self) -> Result<()> {
        self.writer().delete_all_documents()?;
        self.commit_sync()?;
        info!("Lexical index cleared");
        Ok(())
    }

    fn commit_sync(&self) -> Result<()> {
        self.writer()
            .commit()
            .context("Failed to commit lexical index changes")?;
        self.reader
            .reload()
            .context("Failed to reload lexical index reader")?;
        debug!("Lexical index committed");
        Ok(())
    }

    fn replace_file_sync(&self, file_path: &str, symbols: &[Symbol]) -> Result<()> {
        let writer = self.writer();
        writer.delete_term(Term::from_field_text(self.schema.file_path, file_path));

        for symbol in symbols {
            let name_terms = format!("{} {}", symbol.name, camel_tokens(&symbol.name).join(" "));
            writer.add_document(doc!(
                self.schema.symbol_id => symbol.id.as_str(),
                self.schema.name => symbol.name.as_str(),
                self.schema.name_exact => symbol.name.to_lowercase(),
                self.schema.name_terms => name_terms,
                self.schema.kind => symbol.kind.as_str(),
                self.schema.language => symbol.language.as_str(),
                self.schema.file_path => file_path,
                self.schema.start_line => symbol.start_line as u64,
                self.schema.end_line => symbol.end_line as u64,
                self.schema.signature => symbol.signature.as_deref().unwrap_or(""),
                self.schema.doc => symbol.doc_comment.as_deref().unwrap_or(""),
            ))?;
        }

        debug!(file = file_path, symbols = symbols.len(), "Staged lexical documents");
        Ok(())
    }

    fn fuzzy_query(&self, query: &str) -> Option<BooleanQuery> {
        let tokens = query_tokens(query);
        if tokens.is_empty() {
            return None;
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for token in &tokens {
            let name_term = Term::from_field_text(self.schema.name_terms, token);
            clauses.push((
                Occur::Should,
                Box::new(BoostQuery::new(
                    Box::new(TermQuery::new(name_term.clone(), IndexRecordOption::WithFreqs)),
                    NAME_TERM_BOOST,
                )),
            ));
            if token.chars().count() >= 3 {
                clauses.push((
                    Occur::Should,
                    Box::new(FuzzyTermQuery::new(name_term.clone(), edit_distance(token), true)),
                ));
                clauses.push((
                    Occur::Should,
                    Box::new(FuzzyTermQuery::new_prefix(name_term, 0, true)),
                ));
            }
            clauses.push((
                Occur::Should,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.signature, token),
                    IndexRecordOption::WithFreqs,
                )),
            ));
            clauses.push((
                Occur::Should,
                Box::new(BoostQuery::new(
                    Box::new(TermQuery::new(
                        Term::from_field_text(self.schema.doc, token),
                        IndexRecordOption::WithFreqs,
                    )),
                    DOC_BOOST,
                )),
            ));
        }
        Some(BooleanQuery::new(clauses))
    }

    fn run(&self, query: &dyn Query, limit: usize) -> Result<Vec<LexicalHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(query, &TopDocs::with_limit(limit))
            .context("Failed to execute lexical search")?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let document: TantivyDocument = searcher
                .doc(address)
                .context("Failed to retrieve symbol document")?;
            match self.to_hit(&document, score) {
                Some(hit) => hits.push(hit),
                None => warn!("Skipping malformed symbol document at {:?}", address),
            }
        }
        Ok(hits)
    }

    fn to_hit(&self, document: &TantivyDocument, score: f32) -> Option<LexicalHit> {
        let text = |field: Field| document.get_first(field).and_then(|v| v.as_str());
        let number = |field: Field| {
            document
                .get_first(field)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize
        };

        Some(LexicalHit {
            symbol_id: SymbolId::from_raw(text(self.schema.symbol_id)?),
            name: text(self.schema.name)?.to_string(),
            kind: SymbolKind::parse(text(self.schema.kind)?)?,
            language: text(self.schema.language).unwrap_or_default().to_string(),
            file_path: text(self.schema.file_path)?.to_string(),
            start_line: number(self.schema.start_line),
            end_line: number(self.schema.end_line),
            signature: text(self.schema.signature)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            score,
        })
    }
}

/// Lowercase query words plus their camelCase parts, deduplicated in order
fn query_tokens(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for word in query.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let whole = word.to_lowercase();
        for token in std::iter::once(whole).chain(camel_tokens(word)) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    tokens
}

fn edit_distance(token: &str) -> u8 {
    match token.chars().count() {
        0..=3 => 0,
        4..=6 => 1,
        _ => 2,
    }
}

#[async_trait]
impl LexicalIndex for TantivySymbolIndex {
    async fn search_fuzzy(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let start = std::time::Instant::now();
        let Some(parsed) = self.fuzzy_query(query) else {
            return Ok(Vec::new());
        };
        let hits = self.run(&parsed, limit)?;
        debug!(
            search_type = "fuzzy",
            query = query,
            results = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Lexical search completed"
        );
        Ok(hits)
    }

    async fn search_exact(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        let term = Term::from_field_text(self.schema.name_exact, &normalized);
        self.run(&TermQuery::new(term, IndexRecordOption::Basic), limit)
    }

    async fn replace_file(&self, file_path: &str, symbols: &[Symbol]) -> Result<()> {
        self.replace_file_sync(file_path, symbols)
    }

    async fn commit(&self) -> Result<()> {
        self.commit_sync()
    }

    fn index_type(&self) -> &'static str {
        "tantivy"
    }
}
