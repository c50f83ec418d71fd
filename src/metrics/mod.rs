//! Prometheus metrics for codesift
//!
//! Counters and histograms for search, indexing, extraction diagnostics,
//! and embedding calls.

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Search metrics
    // ============================================================================

    /// Total number of search requests
    pub static ref SEARCH_REQUESTS: Counter = Counter::with_opts(
        Opts::new(
            "codesift_search_requests_total",
            "Total number of search requests"
        )
    ).expect("Failed to create SEARCH_REQUESTS counter");

    /// Search request latency in seconds
    pub static ref SEARCH_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "codesift_search_latency_seconds",
            "Search request latency in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("Failed to create SEARCH_LATENCY histogram");

    /// Number of search results returned per request
    pub static ref SEARCH_RESULTS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "codesift_search_results_count",
            "Number of search results returned per request"
        ).buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0])
    ).expect("Failed to create SEARCH_RESULTS histogram");

    /// Searches that dropped their semantic half after an embedder or vector store failure
    pub static ref SEMANTIC_FALLBACKS: Counter = Counter::with_opts(
        Opts::new(
            "codesift_semantic_fallbacks_total",
            "Searches degraded to structural-only results"
        )
    ).expect("Failed to create SEMANTIC_FALLBACKS counter");

    /// Cross-layer entity lookups
    pub static ref ENTITY_REQUESTS: Counter = Counter::with_opts(
        Opts::new(
            "codesift_entity_requests_total",
            "Total number of cross-layer entity lookups"
        )
    ).expect("Failed to create ENTITY_REQUESTS counter");

    // ============================================================================
    // Index metrics
    // ============================================================================

    /// Files in the last indexing run
    pub static ref INDEXED_FILES: Gauge = Gauge::with_opts(
        Opts::new(
            "codesift_indexed_files_total",
            "Total number of indexed files"
        )
    ).expect("Failed to create INDEXED_FILES gauge");

    /// Symbols in the last indexing run
    pub static ref INDEXED_SYMBOLS: Gauge = Gauge::with_opts(
        Opts::new(
            "codesift_indexed_symbols_total",
            "Total number of indexed symbols"
        )
    ).expect("Failed to create INDEXED_SYMBOLS gauge");

    /// Time to index files in seconds
    pub static ref INDEX_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "codesift_indexing_duration_seconds",
            "Time to index files in seconds"
        ).buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0])
    ).expect("Failed to create INDEX_LATENCY histogram");

    // ============================================================================
    // Extraction metrics
    // ============================================================================

    /// Files the parser produced no tree for
    pub static ref PARSE_FAILURES: Counter = Counter::with_opts(
        Opts::new(
            "codesift_parse_failures_total",
            "Files that could not be parsed"
        )
    ).expect("Failed to create PARSE_FAILURES counter");

    /// Nodes skipped because their visit failed
    pub static ref SKIPPED_NODES: Counter = Counter::with_opts(
        Opts::new(
            "codesift_skipped_nodes_total",
            "Syntax nodes skipped during extraction"
        )
    ).expect("Failed to create SKIPPED_NODES counter");

    /// Symbols produced by error-region recovery
    pub static ref RECOVERED_SYMBOLS: Counter = Counter::with_opts(
        Opts::new(
            "codesift_recovered_symbols_total",
            "Symbols recovered from syntax error regions"
        )
    ).expect("Failed to create RECOVERED_SYMBOLS counter");

    // ============================================================================
    // Embedding metrics
    // ============================================================================

    /// Total embedding generation requests
    pub static ref EMBEDDING_REQUESTS: Counter = Counter::with_opts(
        Opts::new(
            "codesift_embedding_requests_total",
            "Total embedding generation requests"
        )
    ).expect("Failed to create EMBEDDING_REQUESTS counter");

    /// Embedding generation latency in seconds
    pub static ref EMBEDDING_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "codesift_embedding_latency_seconds",
            "Embedding generation latency in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0])
    ).expect("Failed to create EMBEDDING_LATENCY histogram");
}

/// Register all metrics with the global registry
///
/// Call once at startup. Panics if a metric is registered twice.
pub fn register_metrics() {
    REGISTRY
        .register(Box::new(SEARCH_REQUESTS.clone()))
        .expect("Failed to register SEARCH_REQUESTS");
    REGISTRY
        .register(Box::new(SEARCH_LATENCY.clone()))
        .expect("Failed to register SEARCH_LATENCY");
    REGISTRY
        .register(Box::new(SEARCH_RESULTS.clone()))
        .expect("Failed to register SEARCH_RESULTS");
    REGISTRY
        .register(Box::new(SEMANTIC_FALLBACKS.clone()))
        .expect("Failed to register SEMANTIC_FALLBACKS");
    REGISTRY
        .register(Box::new(ENTITY_REQUESTS.clone()))
        .expect("Failed to register ENTITY_REQUESTS");
    REGISTRY
        .register(Box::new(INDEXED_FILES.clone()))
        .expect("Failed to register INDEXED_FILES");
    REGISTRY
        .register(Box::new(INDEXED_SYMBOLS.clone()))
        .expect("Failed to register INDEXED_SYMBOLS");
    REGISTRY
        .register(Box::new(INDEX_LATENCY.clone()))
        .expect("Failed to register INDEX_LATENCY");
    REGISTRY
        .register(Box::new(PARSE_FAILURES.clone()))
        .expect("Failed to register PARSE_FAILURES");
    REGISTRY
        .register(Box::new(SKIPPED_NODES.clone()))
        .expect("Failed to register SKIPPED_NODES");
    REGISTRY
        .register(Box::new(RECOVERED_SYMBOLS.clone()))
        .expect("Failed to register RECOVERED_SYMBOLS");
    REGISTRY
        .register(Box::new(EMBEDDING_REQUESTS.clone()))
        .expect("Failed to register EMBEDDING_REQUESTS");
    REGISTRY
        .register(Box::new(EMBEDDING_LATENCY.clone()))
        .expect("Failed to register EMBEDDING_LATENCY");
}

/// Gather all metrics and encode them in Prometheus text format
///
/// Returns an empty string if encoding fails.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics contained invalid UTF-8: {}", e);
        String::new()
    })
}

/// Current metric values for the `stats` command
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSnapshot {
    pub search_requests_total: f64,
    pub search_latency_avg: f64,
    pub search_results_avg: f64,
    pub semantic_fallbacks_total: f64,
    pub indexed_files: f64,
    pub indexed_symbols: f64,
    pub parse_failures_total: f64,
    pub skipped_nodes_total: f64,
    pub recovered_symbols_total: f64,
    pub embedding_requests_total: f64,
    pub embedding_latency_avg: f64,
}

impl MetricSnapshot {
    pub fn capture() -> Self {
        Self {
            search_requests_total: SEARCH_REQUESTS.get(),
            search_latency_avg: calculate_histogram_avg(&SEARCH_LATENCY),
            search_results_avg: calculate_histogram_avg(&SEARCH_RESULTS),
            semantic_fallbacks_total: SEMANTIC_FALLBACKS.get(),
            indexed_files: INDEXED_FILES.get(),
            indexed_symbols: INDEXED_SYMBOLS.get(),
            parse_failures_total: PARSE_FAILURES.get(),
            skipped_nodes_total: SKIPPED_NODES.get(),
            recovered_symbols_total: RECOVERED_SYMBOLS.get(),
            embedding_requests_total: EMBEDDING_REQUESTS.get(),
            embedding_latency_avg: calculate_histogram_avg(&EMBEDDING_LATENCY),
        }
    }
}

fn calculate_histogram_avg(histogram: &Histogram) -> f64 {
    let count = histogram.get_sample_count();
    if count == 0 {
        return 0.0;
    }
    histogram.get_sample_sum() / count as f64
}
