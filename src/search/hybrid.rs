//! Hybrid search combining lexical name matching with embedding similarity.
//!
//! Structural candidates come from the lexical index and are scored by how
//! well their name and shape answer the query. Semantic candidates come from
//! the vector store; ones already found structurally get the semantic score
//! added on top, new ones are looked up in the symbol store.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::layers::{detect_pattern, recommendations, Layer};
use super::scoring::{name_score, structure_score, StructuralFacts};
use super::traits::{LexicalHit, LexicalIndex};
use crate::config::SearchConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::EngineError;
use crate::metrics::{
    ENTITY_REQUESTS, SEARCH_LATENCY, SEARCH_REQUESTS, SEARCH_RESULTS, SEMANTIC_FALLBACKS,
};
use crate::storage::{SymbolStore, VectorMatch, VectorStore};
use crate::symbol::{Symbol, SymbolId, SymbolKind};

const DEFAULT_FUZZY_WEIGHT: f32 = 0.7;
const DEFAULT_EXACT_WEIGHT: f32 = 0.3;

/// Structure score given to candidates found only by embedding similarity
const SEMANTIC_ONLY_STRUCTURE_SCORE: f32 = 0.2;

/// Words appended to an entity name before embedding it
const ENTITY_QUERY_SUFFIX: &str = "entity data model DTO class interface table";

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub include_structural: bool,
    pub include_semantic: bool,
    pub name_weight: f32,
    pub structure_weight: f32,
    pub semantic_weight: f32,
    /// Minimum vector confidence for a semantic candidate
    pub semantic_threshold: f32,
    pub max_results: usize,
    /// Vector neighbours examined by [`HybridSearchEngine::find_cross_layer_entity`]
    pub entity_neighbours: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            include_structural: true,
            include_semantic: true,
            name_weight: 0.3,
            structure_weight: 0.3,
            semantic_weight: 0.4,
            semantic_threshold: 0.3,
            max_results: 20,
            entity_neighbours: 50,
        }
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            include_structural: true,
            include_semantic: true,
            name_weight: config.name_weight,
            structure_weight: config.structure_weight,
            semantic_weight: config.semantic_weight,
            semantic_threshold: config.semantic_threshold,
            max_results: config.max_results,
            entity_neighbours: config.entity_neighbours,
        }
    }
}

/// How a result entered the ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Structural,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub symbol_id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub language: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub score: f32,
    pub name_score: f32,
    pub structure_score: f32,
    /// Merged fuzzy/exact score from the lexical index, structural hits only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_distance: Option<f32>,
    pub confidence: f32,
    pub search_method: SearchMethod,
}

impl RankedResult {
    fn structural(query: &str, hit: LexicalHit, lexical: f32, options: &SearchOptions) -> Self {
        let name = name_score(query, &hit.name);
        let structure = structure_score(
            query,
            StructuralFacts {
                kind: hit.kind,
                file_path: &hit.file_path,
                language: &hit.language,
                line_span: hit.line_span(),
            },
        );
        Self {
            symbol_id: hit.symbol_id,
            name: hit.name,
            kind: hit.kind,
            language: hit.language,
            file_path: hit.file_path,
            start_line: hit.start_line,
            end_line: hit.end_line,
            signature: hit.signature,
            score: name * options.name_weight + structure * options.structure_weight,
            name_score: name,
            structure_score: structure,
            lexical_score: Some(lexical),
            semantic_score: None,
            semantic_distance: None,
            confidence: name,
            search_method: SearchMethod::Structural,
        }
    }

    fn semantic(query: &str, symbol: Symbol, hit: &VectorMatch, options: &SearchOptions) -> Self {
        let name = name_score(query, &symbol.name);
        Self {
            score: name * options.name_weight
                + SEMANTIC_ONLY_STRUCTURE_SCORE * options.structure_weight
                + hit.confidence * options.semantic_weight,
            name_score: name,
            structure_score: SEMANTIC_ONLY_STRUCTURE_SCORE,
            lexical_score: None,
            semantic_score: Some(hit.confidence),
            semantic_distance: Some(hit.distance),
            confidence: hit.confidence,
            search_method: SearchMethod::Semantic,
            start_line: symbol.start_line,
            end_line: symbol.end_line,
            symbol_id: symbol.id,
            name: symbol.name,
            kind: symbol.kind,
            language: symbol.language,
            file_path: symbol.file_path,
            signature: symbol.signature,
        }
    }

    fn add_semantic(&mut self, hit: &VectorMatch, options: &SearchOptions) {
        self.score += hit.confidence * options.semantic_weight;
        self.semantic_score = Some(hit.confidence);
        self.semantic_distance = Some(hit.distance);
        self.confidence = self.confidence.max(hit.confidence);
        self.search_method = SearchMethod::Hybrid;
    }
}

/// Score desc, then symbol id asc, then truncate
pub fn rank(mut results: Vec<RankedResult>, limit: usize) -> Vec<RankedResult> {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol_id.cmp(&b.symbol_id))
    });
    results.truncate(limit);
    results
}

/// Combines the fuzzy and exact lexical passes.
///
/// Each pass is normalised by its own top score, then summed per symbol
/// with the pass weight.
pub struct LexicalMerge {
    fuzzy_weight: f32,
    exact_weight: f32,
}

impl LexicalMerge {
    pub fn new() -> Self {
        Self {
            fuzzy_weight: DEFAULT_FUZZY_WEIGHT,
            exact_weight: DEFAULT_EXACT_WEIGHT,
        }
    }

    pub fn merge(
        &self,
        fuzzy: Vec<LexicalHit>,
        exact: Vec<LexicalHit>,
        limit: usize,
    ) -> Vec<(LexicalHit, f32)> {
        let mut merged: HashMap<SymbolId, (LexicalHit, f32)> = HashMap::new();

        for (hits, weight) in [(fuzzy, self.fuzzy_weight), (exact, self.exact_weight)] {
            let top = hits.iter().map(|h| h.score).fold(0.0f32, f32::max);
            for hit in hits {
                let normalized = if top > 0.0 { hit.score / top } else { 1.0 };
                let contribution = normalized * weight;
                merged
                    .entry(hit.symbol_id.clone())
                    .and_modify(|(_, score)| *score += contribution)
                    .or_insert((hit, contribution));
            }
        }

        let mut sorted: Vec<_> = merged.into_values().collect();
        sorted.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.symbol_id.cmp(&b.0.symbol_id))
        });
        sorted.truncate(limit);
        sorted
    }
}

impl Default for LexicalMerge {
    fn default() -> Self {
        Self::new()
    }
}

/// Embedder plus vector store, brought up together
#[derive(Clone)]
pub struct SemanticBackend {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vectors: Arc<dyn VectorStore>,
}

/// Builds the semantic backend on first use
#[async_trait]
pub trait SemanticBackendFactory: Send + Sync {
    async fn create(&self) -> Result<SemanticBackend>;
}

/// An already constructed backend
#[async_trait]
impl SemanticBackendFactory for SemanticBackend {
    async fn create(&self) -> Result<SemanticBackend> {
        Ok(self.clone())
    }
}

/// One representation of the entity in some layer
#[derive(Debug, Clone, Serialize)]
pub struct LayerMatch {
    pub symbol_id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: usize,
    pub layer: Layer,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossLayerResult {
    pub entity_name: String,
    pub matches: Vec<LayerMatch>,
    /// Mean match confidence, 0 with no matches
    pub total_confidence: f32,
    pub layer_counts: BTreeMap<Layer, usize>,
    pub architectural_pattern: String,
    pub recommendations: Vec<String>,
}

impl CrossLayerResult {
    fn from_matches(entity_name: &str, mut matches: Vec<LayerMatch>) -> Self {
        matches.sort_by(|a, b| {
            a.layer
                .cmp(&b.layer)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.symbol_id.cmp(&b.symbol_id))
        });

        let total_confidence = if matches.is_empty() {
            0.0
        } else {
            matches.iter().map(|m| m.confidence).sum::<f32>() / matches.len() as f32
        };

        let mut layer_counts = BTreeMap::new();
        for m in &matches {
            *layer_counts.entry(m.layer).or_insert(0) += 1;
        }

        let architectural_pattern =
            detect_pattern(layer_counts.keys().map(|layer| layer.as_str())).to_string();
        let recommendations = recommendations(entity_name, &layer_counts, total_confidence);

        Self {
            entity_name: entity_name.to_string(),
            matches,
            total_confidence,
            layer_counts,
            architectural_pattern,
            recommendations,
        }
    }
}

/// Top-level search component.
///
/// The semantic backend is created at most once: concurrent first callers
/// wait on the same initialization, and a failed attempt leaves the engine
/// uninitialized so the next call retries.
pub struct HybridSearchEngine {
    lexical: Arc<dyn LexicalIndex>,
    symbols: Arc<dyn SymbolStore>,
    factory: Arc<dyn SemanticBackendFactory>,
    backend: OnceCell<SemanticBackend>,
    lazy_init: bool,
    merge: LexicalMerge,
}

impl HybridSearchEngine {
    pub fn new(
        lexical: Arc<dyn LexicalIndex>,
        symbols: Arc<dyn SymbolStore>,
        factory: Arc<dyn SemanticBackendFactory>,
    ) -> Self {
        Self {
            lexical,
            symbols,
            factory,
            backend: OnceCell::new(),
            lazy_init: true,
            merge: LexicalMerge::new(),
        }
    }

    /// With lazy init off, semantic calls fail until [`Self::initialize`] succeeds
    pub fn with_lazy_init(mut self, lazy_init: bool) -> Self {
        self.lazy_init = lazy_init;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }

    /// Bring up the semantic backend. Repeated calls are no-ops once it succeeded.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.init_backend().await.map(|_| ())
    }

    async fn init_backend(&self) -> Result<&SemanticBackend, EngineError> {
        self.backend
            .get_or_try_init(|| async {
                let start = Instant::now();
                match self.factory.create().await {
                    Ok(backend) => {
                        info!(
                            provider = backend.embedder.provider_name(),
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Semantic backend initialized"
                        );
                        Ok(backend)
                    }
                    Err(e) => {
                        warn!("Semantic backend initialization failed: {:#}", e);
                        Err(EngineError::Initialization(e))
                    }
                }
            })
            .await
    }

    async fn semantic_backend(&self) -> Result<&SemanticBackend, EngineError> {
        if let Some(backend) = self.backend.get() {
            return Ok(backend);
        }
        if !self.lazy_init {
            return Err(EngineError::NotInitialized);
        }
        self.init_backend().await
    }

    /// Symbols currently held by the symbol store
    pub async fn indexed_symbol_count(&self) -> Result<usize, EngineError> {
        self.symbols
            .symbol_count()
            .await
            .map_err(EngineError::SymbolStore)
    }

    /// Ranked symbols answering `query`, best first
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RankedResult>, EngineError> {
        let query = query.trim();
        if query.is_empty() || options.max_results == 0 {
            return Ok(Vec::new());
        }

        SEARCH_REQUESTS.inc();
        let start = Instant::now();
        let candidate_limit = options.max_results.saturating_mul(2);

        let mut candidates: HashMap<SymbolId, RankedResult> = HashMap::new();

        if options.include_structural {
            for (hit, lexical) in self.structural_candidates(query, candidate_limit).await? {
                let result = RankedResult::structural(query, hit, lexical, options);
                candidates.insert(result.symbol_id.clone(), result);
            }
        }

        if options.include_semantic {
            let backend = self.semantic_backend().await?;
            match self
                .semantic_matches(backend, query, candidate_limit, options.semantic_threshold)
                .await
            {
                Ok(matches) => {
                    self.merge_semantic(query, matches, options, &mut candidates)
                        .await
                }
                Err(e) => {
                    SEMANTIC_FALLBACKS.inc();
                    warn!(
                        query = query,
                        "Semantic search failed, returning structural results only: {:#}", e
                    );
                }
            }
        }

        let results = rank(candidates.into_values().collect(), options.max_results);

        let elapsed = start.elapsed();
        SEARCH_LATENCY.observe(elapsed.as_secs_f64());
        SEARCH_RESULTS.observe(results.len() as f64);
        info!(
            search_type = "hybrid",
            query = query,
            results = results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Hybrid search completed"
        );

        Ok(results)
    }

    async fn structural_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(LexicalHit, f32)>, EngineError> {
        let (fuzzy, exact) = tokio::join!(
            self.lexical.search_fuzzy(query, limit),
            self.lexical.search_exact(query, limit)
        );
        let fuzzy = fuzzy.map_err(EngineError::Lexical)?;
        let exact = exact.map_err(EngineError::Lexical)?;
        Ok(self.merge.merge(fuzzy, exact, limit))
    }

    async fn semantic_matches(
        &self,
        backend: &SemanticBackend,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<VectorMatch>> {
        let embedding = backend.embedder.embed_query(query).await?;
        backend
            .vectors
            .search(&embedding.vector, limit, threshold)
            .await
    }

    async fn merge_semantic(
        &self,
        query: &str,
        matches: Vec<VectorMatch>,
        options: &SearchOptions,
        candidates: &mut HashMap<SymbolId, RankedResult>,
    ) {
        let mut merged: HashSet<SymbolId> = HashSet::new();

        for hit in matches {
            if !merged.insert(hit.symbol_id.clone()) {
                continue;
            }
            if let Some(existing) = candidates.get_mut(&hit.symbol_id) {
                existing.add_semantic(&hit, options);
                continue;
            }
            match self.symbols.get_by_id(&hit.symbol_id).await {
                Ok(Some(symbol)) => {
                    let result = RankedResult::semantic(query, symbol, &hit, options);
                    candidates.insert(result.symbol_id.clone(), result);
                }
                Ok(None) => {
                    debug!(symbol_id = %hit.symbol_id, "SymbolNotFound: dropping semantic match");
                }
                Err(e) => {
                    warn!(symbol_id = %hit.symbol_id, "Failed to load symbol: {:#}", e);
                }
            }
        }
    }

    /// Representations of one entity across architectural layers.
    ///
    /// Only the `options.entity_neighbours` nearest vectors are examined.
    pub async fn find_cross_layer_entity(
        &self,
        entity_name: &str,
        options: &SearchOptions,
    ) -> Result<CrossLayerResult, EngineError> {
        let entity_name = entity_name.trim();
        if entity_name.is_empty() {
            return Ok(CrossLayerResult::from_matches(entity_name, Vec::new()));
        }

        ENTITY_REQUESTS.inc();
        let start = Instant::now();
        let backend = self.semantic_backend().await?;

        let query = format!("{} {}", entity_name, ENTITY_QUERY_SUFFIX);
        let embedding = backend
            .embedder
            .embed_query(&query)
            .await
            .map_err(EngineError::Embedding)?;
        let hits = backend
            .vectors
            .find_cross_layer_entity(entity_name, &embedding.vector, options.entity_neighbours)
            .await
            .map_err(EngineError::VectorStore)?;

        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.symbols.get_by_id(&hit.symbol_id).await {
                Ok(Some(symbol)) => matches.push(LayerMatch {
                    symbol_id: symbol.id,
                    name: symbol.name,
                    kind: symbol.kind,
                    file_path: symbol.file_path,
                    start_line: symbol.start_line,
                    layer: hit.layer,
                    confidence: hit.confidence,
                }),
                Ok(None) => {
                    debug!(symbol_id = %hit.symbol_id, "SymbolNotFound: dropping entity match");
                }
                Err(e) => {
                    warn!(symbol_id = %hit.symbol_id, "Failed to load symbol: {:#}", e);
                }
            }
        }

        let result = CrossLayerResult::from_matches(entity_name, matches);
        info!(
            entity = entity_name,
            matches = result.matches.len(),
            layers = result.layer_counts.len(),
            pattern = %result.architectural_pattern,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Cross-layer lookup completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HealthStatus;
    use crate::storage::{MemorySymbolStore, MemoryVectorStore, VectorRecord};
    use crate::symbol::{Position, SymbolSpan, Visibility};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn symbol(file: &str, name: &str, kind: SymbolKind, line: usize) -> Symbol {
        Symbol::new(
            name,
            kind,
            "python",
            file,
            SymbolSpan {
                start: Position::new(line, 0),
                end: Position::new(line + 9, 0),
                start_byte: line * 100,
                end_byte: line * 100 + 90,
            },
            Visibility::Public,
        )
    }

    fn hit(symbol: &Symbol, score: f32) -> LexicalHit {
        LexicalHit {
            symbol_id: symbol.id.clone(),
            name: symbol.name.clone(),
            kind: symbol.kind,
            language: symbol.language.clone(),
            file_path: symbol.file_path.clone(),
            start_line: symbol.start_line,
            end_line: symbol.end_line,
            signature: None,
            score,
        }
    }

    struct StubLexical {
        fuzzy: Vec<LexicalHit>,
        exact: Vec<LexicalHit>,
    }

    #[async_trait]
    impl LexicalIndex for StubLexical {
        async fn search_fuzzy(&self, _query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
            Ok(self.fuzzy.iter().take(limit).cloned().collect())
        }

        async fn search_exact(&self, _query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
            Ok(self.exact.iter().take(limit).cloned().collect())
        }

        async fn replace_file(&self, _file_path: &str, _symbols: &[Symbol]) -> Result<()> {
            Ok(())
        }

        async fn commit(&self) -> Result<()> {
            Ok(())
        }

        fn index_type(&self) -> &'static str {
            "stub"
        }
    }

    /// Every text embeds to the same unit vector
    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }

        fn embedding_dimension(&self) -> usize {
            3
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }

        async fn health_check(&self) -> Result<HealthStatus> {
            Ok(HealthStatus::Healthy)
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("model unavailable")
        }

        fn embedding_dimension(&self) -> usize {
            3
        }

        fn provider_name(&self) -> &'static str {
            "failing"
        }

        async fn health_check(&self) -> Result<HealthStatus> {
            Ok(HealthStatus::Unhealthy {
                error: "model unavailable".to_string(),
            })
        }
    }

    struct CountingFactory {
        calls: AtomicUsize,
        failures_before_success: usize,
        backend: SemanticBackend,
    }

    #[async_trait]
    impl SemanticBackendFactory for CountingFactory {
        async fn create(&self) -> Result<SemanticBackend> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if call < self.failures_before_success {
                anyhow::bail!("embedding model download failed");
            }
            Ok(self.backend.clone())
        }
    }

    struct Fixture {
        user_service: Symbol,
        user_service_impl: Symbol,
        load_user: Symbol,
        symbols: Arc<MemorySymbolStore>,
        vectors: Arc<MemoryVectorStore>,
    }

    async fn fixture() -> Fixture {
        let user_service = symbol("app/services.py", "UserService", SymbolKind::Class, 1);
        let user_service_impl = symbol("app/services.py", "UserServiceImpl", SymbolKind::Class, 20);
        let load_user = symbol("app/loaders.py", "load_user", SymbolKind::Function, 1);
        let stale = symbol("app/removed.py", "OldUser", SymbolKind::Class, 1);

        let symbols = Arc::new(MemorySymbolStore::new());
        symbols
            .replace_file_symbols(
                "app/services.py",
                vec![user_service.clone(), user_service_impl.clone()],
                Vec::new(),
            )
            .await
            .unwrap();
        symbols
            .replace_file_symbols("app/loaders.py", vec![load_user.clone()], Vec::new())
            .await
            .unwrap();

        let vectors = Arc::new(MemoryVectorStore::new());
        vectors
            .replace_file(
                "app/services.py",
                vec![VectorRecord::for_symbol(&user_service, vec![1.0, 0.0, 0.0])],
            )
            .await
            .unwrap();
        vectors
            .replace_file(
                "app/loaders.py",
                vec![VectorRecord::for_symbol(&load_user, vec![0.6, 0.8, 0.0])],
            )
            .await
            .unwrap();
        vectors
            .replace_file(
                "app/removed.py",
                vec![VectorRecord::for_symbol(&stale, vec![0.8, 0.6, 0.0])],
            )
            .await
            .unwrap();

        Fixture {
            user_service,
            user_service_impl,
            load_user,
            symbols,
            vectors,
        }
    }

    fn engine(fx: &Fixture, embedder: Arc<dyn EmbeddingProvider>) -> HybridSearchEngine {
        let lexical = Arc::new(StubLexical {
            fuzzy: vec![hit(&fx.user_service_impl, 4.0), hit(&fx.user_service, 3.5)],
            exact: vec![hit(&fx.user_service, 2.0)],
        });
        let backend = SemanticBackend {
            embedder,
            vectors: fx.vectors.clone(),
        };
        HybridSearchEngine::new(lexical, fx.symbols.clone(), Arc::new(backend))
    }

    #[test]
    fn test_lexical_merge_normalizes_each_pass() {
        let a = symbol("a.py", "alpha", SymbolKind::Function, 1);
        let b = symbol("a.py", "beta", SymbolKind::Function, 20);

        let merged = LexicalMerge::new().merge(
            vec![hit(&a, 10.0), hit(&b, 5.0)],
            vec![hit(&b, 2.0)],
            10,
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0.name, "alpha");
        assert!((merged[0].1 - 0.7).abs() < 1e-6);
        assert_eq!(merged[1].0.name, "beta");
        assert!((merged[1].1 - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_lexical_merge_truncates() {
        let hits: Vec<_> = (1..=5)
            .map(|i| hit(&symbol("a.py", &format!("f{}", i), SymbolKind::Function, i * 10), i as f32))
            .collect();
        let merged = LexicalMerge::new().merge(hits, Vec::new(), 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].0.name, "f5");
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FixedEmbedder));
        let results = engine.search("   ", &SearchOptions::default()).await.unwrap();
        assert!(results.is_empty());
        assert!(!engine.is_initialized());
    }

    #[tokio::test]
    async fn test_exact_name_ranks_first() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FixedEmbedder));
        let options = SearchOptions {
            include_semantic: false,
            ..Default::default()
        };

        let results = engine.search("UserService", &options).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "UserService");
        assert_eq!(results[0].name_score, 1.0);
        assert_eq!(results[0].confidence, 1.0);
        assert_eq!(results[0].search_method, SearchMethod::Structural);
        assert_eq!(results[1].name_score, 0.8);
    }

    #[tokio::test]
    async fn test_structural_results_carry_lexical_score() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FixedEmbedder));
        let options = SearchOptions {
            include_semantic: false,
            ..Default::default()
        };

        let results = engine.search("UserService", &options).await.unwrap();

        let by_name: HashMap<_, _> = results.iter().map(|r| (r.name.as_str(), r)).collect();
        // fuzzy 3.5 / 4.0 at 0.7 plus the only exact hit at 0.3
        assert!((by_name["UserService"].lexical_score.unwrap() - 0.9125).abs() < 1e-5);
        assert!((by_name["UserServiceImpl"].lexical_score.unwrap() - 0.7).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_semantic_matches_merge_once() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FixedEmbedder));
        let options = SearchOptions {
            semantic_threshold: 0.5,
            ..Default::default()
        };

        let results = engine.search("UserService", &options).await.unwrap();

        let by_name: HashMap<_, _> = results.iter().map(|r| (r.name.as_str(), r)).collect();
        assert_eq!(results.len(), 3);
        assert!(!by_name.contains_key("OldUser"));

        let exact = by_name["UserService"];
        assert_eq!(exact.search_method, SearchMethod::Hybrid);
        assert_eq!(exact.semantic_score, Some(1.0));
        assert!(exact.semantic_distance.unwrap().abs() < 1e-6);
        let structural_part = exact.name_score * 0.3 + exact.structure_score * 0.3;
        assert!((exact.score - (structural_part + 0.4)).abs() < 1e-5);

        let loaded = by_name["load_user"];
        assert_eq!(loaded.search_method, SearchMethod::Semantic);
        assert_eq!(loaded.structure_score, 0.2);
        assert_eq!(loaded.lexical_score, None);
        assert!((loaded.confidence - 0.6).abs() < 1e-5);

        assert_eq!(by_name["UserServiceImpl"].search_method, SearchMethod::Structural);
        assert_eq!(results[0].symbol_id, fx.user_service.id);
        assert_eq!(loaded.symbol_id, fx.load_user.id);
    }

    #[tokio::test]
    async fn test_results_are_deterministic() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FixedEmbedder));
        let options = SearchOptions::default();

        let first: Vec<_> = engine
            .search("user", &options)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.symbol_id, r.score))
            .collect();
        let second: Vec<_> = engine
            .search("user", &options)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.symbol_id, r.score))
            .collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_embedder_failure_degrades_to_structural() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FailingEmbedder));
        let before = SEMANTIC_FALLBACKS.get();

        let results = engine
            .search("UserService", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| r.search_method == SearchMethod::Structural));
        assert!(SEMANTIC_FALLBACKS.get() > before);
    }

    #[tokio::test]
    async fn test_not_initialized_without_lazy_init() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FixedEmbedder)).with_lazy_init(false);

        let err = engine
            .search("UserService", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized));
        assert!(err.is_retryable());

        engine.initialize().await.unwrap();
        assert!(engine.is_initialized());
        assert!(!engine
            .search("UserService", &SearchOptions::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_initialization_runs_once() {
        let fx = fixture().await;
        let factory = Arc::new(CountingFactory {
            calls: AtomicUsize::new(0),
            failures_before_success: 0,
            backend: SemanticBackend {
                embedder: Arc::new(FixedEmbedder),
                vectors: fx.vectors.clone(),
            },
        });
        let engine = Arc::new(HybridSearchEngine::new(
            Arc::new(StubLexical {
                fuzzy: Vec::new(),
                exact: Vec::new(),
            }),
            fx.symbols.clone(),
            factory.clone(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.initialize().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let fx = fixture().await;
        let factory = Arc::new(CountingFactory {
            calls: AtomicUsize::new(0),
            failures_before_success: 1,
            backend: SemanticBackend {
                embedder: Arc::new(FixedEmbedder),
                vectors: fx.vectors.clone(),
            },
        });
        let engine = HybridSearchEngine::new(
            Arc::new(StubLexical {
                fuzzy: Vec::new(),
                exact: Vec::new(),
            }),
            fx.symbols.clone(),
            factory.clone(),
        );

        let err = engine.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::Initialization(_)));
        assert!(!engine.is_initialized());

        engine.initialize().await.unwrap();
        assert!(engine.is_initialized());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cross_layer_entity() {
        let frontend = symbol("web/frontend/types.ts", "IUserDto", SymbolKind::Interface, 1);
        let api = symbol("server/api/users.py", "UserController", SymbolKind::Class, 1);
        let domain = symbol("server/domain/user.py", "User", SymbolKind::Class, 1);
        let unrelated = symbol("server/domain/invoice.py", "Invoice", SymbolKind::Class, 1);

        let symbols = Arc::new(MemorySymbolStore::new());
        let vectors = Arc::new(MemoryVectorStore::new());
        for (s, v) in [
            (&frontend, vec![0.9, 0.1, 0.0]),
            (&api, vec![0.8, 0.2, 0.0]),
            (&domain, vec![1.0, 0.0, 0.0]),
            (&unrelated, vec![0.5, 0.5, 0.7]),
        ] {
            symbols
                .replace_file_symbols(&s.file_path, vec![s.clone()], Vec::new())
                .await
                .unwrap();
            vectors
                .replace_file(&s.file_path, vec![VectorRecord::for_symbol(s, v)])
                .await
                .unwrap();
        }

        let engine = HybridSearchEngine::new(
            Arc::new(StubLexical {
                fuzzy: Vec::new(),
                exact: Vec::new(),
            }),
            symbols,
            Arc::new(SemanticBackend {
                embedder: Arc::new(FixedEmbedder),
                vectors,
            }),
        );

        let result = engine
            .find_cross_layer_entity("User", &SearchOptions::default())
            .await
            .unwrap();

        let layers: Vec<_> = result.matches.iter().map(|m| (m.layer, m.name.as_str())).collect();
        assert_eq!(
            layers,
            vec![
                (Layer::Frontend, "IUserDto"),
                (Layer::Api, "UserController"),
                (Layer::Domain, "User"),
            ]
        );
        assert!(result.matches.iter().all(|m| m.confidence == 1.0));
        assert_eq!(result.total_confidence, 1.0);
        assert_eq!(result.architectural_pattern, "Clean Architecture");
        assert_eq!(result.recommendations.len(), 1);
        assert!(result.recommendations[0].contains("no database schema"));
    }

    /// `User` in four layers plus an unrelated symbol pointing elsewhere
    async fn layered_engine() -> HybridSearchEngine {
        let frontend = symbol("web/frontend/types.ts", "IUserDto", SymbolKind::Interface, 1);
        let api = symbol("server/api/user_dto.py", "UserDto", SymbolKind::Class, 1);
        let domain = symbol("src/domain/user.py", "User", SymbolKind::Class, 1);
        let database = symbol("db/database/schema.sql", "users", SymbolKind::Struct, 1);
        let unrelated = symbol("src/domain/invoice.py", "Invoice", SymbolKind::Class, 1);

        let symbols = Arc::new(MemorySymbolStore::new());
        let vectors = Arc::new(MemoryVectorStore::new());
        for (s, v) in [
            (&frontend, vec![0.8, 0.2, 0.0]),
            (&api, vec![0.9, 0.1, 0.0]),
            (&domain, vec![1.0, 0.0, 0.0]),
            (&database, vec![0.7, 0.3, 0.0]),
            (&unrelated, vec![0.0, 0.0, 1.0]),
        ] {
            symbols
                .replace_file_symbols(&s.file_path, vec![s.clone()], Vec::new())
                .await
                .unwrap();
            vectors
                .replace_file(&s.file_path, vec![VectorRecord::for_symbol(s, v)])
                .await
                .unwrap();
        }

        HybridSearchEngine::new(
            Arc::new(StubLexical {
                fuzzy: Vec::new(),
                exact: Vec::new(),
            }),
            symbols,
            Arc::new(SemanticBackend {
                embedder: Arc::new(FixedEmbedder),
                vectors,
            }),
        )
    }

    #[tokio::test]
    async fn test_cross_layer_entity_spans_all_four_layers() {
        let engine = layered_engine().await;

        let result = engine
            .find_cross_layer_entity("User", &SearchOptions::default())
            .await
            .unwrap();

        let layers: Vec<_> = result.matches.iter().map(|m| (m.layer, m.name.as_str())).collect();
        assert_eq!(
            layers,
            vec![
                (Layer::Frontend, "IUserDto"),
                (Layer::Api, "UserDto"),
                (Layer::Domain, "User"),
                (Layer::Database, "users"),
            ]
        );
        assert_eq!(
            result.layer_counts,
            BTreeMap::from([
                (Layer::Frontend, 1),
                (Layer::Api, 1),
                (Layer::Domain, 1),
                (Layer::Database, 1),
            ])
        );
        assert_eq!(result.architectural_pattern, "Clean Architecture");
        assert!((result.total_confidence - 1.0).abs() < 1e-6);
        assert!(result.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_entity_neighbours_bound_the_lookup() {
        let engine = layered_engine().await;
        let options = SearchOptions {
            entity_neighbours: 2,
            ..Default::default()
        };

        let result = engine.find_cross_layer_entity("User", &options).await.unwrap();

        let names: Vec<_> = result.matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["UserDto", "User"]);
        assert!(!result.layer_counts.contains_key(&Layer::Database));
        assert_eq!(result.architectural_pattern, "Custom Architecture");
    }

    #[test]
    fn test_entity_neighbours_follow_config() {
        let config = SearchConfig {
            entity_neighbours: 500,
            ..Default::default()
        };
        assert_eq!(SearchOptions::from(&config).entity_neighbours, 500);
        assert_eq!(SearchOptions::default().entity_neighbours, 50);
    }

    #[tokio::test]
    async fn test_cross_layer_empty_name() {
        let fx = fixture().await;
        let engine = engine(&fx, Arc::new(FixedEmbedder));
        let result = engine
            .find_cross_layer_entity("  ", &SearchOptions::default())
            .await
            .unwrap();
        assert!(result.matches.is_empty());
        assert_eq!(result.total_confidence, 0.0);
        assert_eq!(result.architectural_pattern, "Custom Architecture");
        assert!(!engine.is_initialized());
    }
}
