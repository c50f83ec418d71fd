//! Hybrid search and cross-layer lookup over an indexed temp project

use std::collections::BTreeSet;
use std::sync::Arc;

use codesift::error::EngineError;
use codesift::search::{Layer, SearchMethod, SearchOptions};

use crate::helpers::failing_embedder::FailingEmbedder;
use crate::helpers::test_harness::{TestHarness, TEST_DIMENSION};

async fn user_project() -> TestHarness {
    let harness = TestHarness::new().unwrap();
    harness
        .create_test_file("frontend/user_view.py", "class UserView:\n    pass\n")
        .unwrap();
    harness
        .create_test_file(
            "api/user_controller.py",
            "class UserController:\n    def get_user(self, user_id):\n        return None\n",
        )
        .unwrap();
    harness
        .create_test_file("domain/user.py", "class User:\n    pass\n")
        .unwrap();
    harness
        .create_test_file("domain/order.py", "class Order:\n    pass\n")
        .unwrap();
    harness
        .create_test_file(
            "data/user_repository.py",
            "class UserRepository:\n    def load_user_config(self):\n        return {}\n",
        )
        .unwrap();
    harness
        .create_test_file(
            "config/settings.py",
            "class UserConfig:\n    pass\n\n\ndef load_user():\n    return UserConfig()\n",
        )
        .unwrap();
    harness.index().await.unwrap();
    harness
}

#[tokio::test]
async fn test_exact_name_ranks_first() {
    let harness = user_project().await;
    let engine = harness.engine();

    let structural = SearchOptions {
        include_semantic: false,
        ..Default::default()
    };
    let results = engine.search("UserConfig", &structural).await.unwrap();
    assert_eq!(results[0].name, "UserConfig");
    assert_eq!(results[0].name_score, 1.0);
    assert_eq!(results[0].search_method, SearchMethod::Structural);

    let results = engine
        .search("UserConfig", &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(results[0].name, "UserConfig");
}

#[tokio::test]
async fn test_hybrid_results_are_unique_and_ordered() {
    let harness = user_project().await;
    let engine = harness.engine();

    let results = engine
        .search("user", &SearchOptions::default())
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= SearchOptions::default().max_results);

    let ids: BTreeSet<_> = results.iter().map(|r| r.symbol_id.clone()).collect();
    assert_eq!(ids.len(), results.len());

    for pair in results.windows(2) {
        assert!(
            pair[0].score > pair[1].score
                || (pair[0].score == pair[1].score && pair[0].symbol_id < pair[1].symbol_id)
        );
    }
}

#[tokio::test]
async fn test_repeated_search_is_identical() {
    let harness = user_project().await;
    let engine = harness.engine();
    let options = SearchOptions::default();

    let first = engine.search("load user", &options).await.unwrap();
    let second = engine.search("load user", &options).await.unwrap();

    let key = |r: &codesift::search::RankedResult| (r.symbol_id.clone(), r.score.to_bits());
    assert_eq!(
        first.iter().map(key).collect::<Vec<_>>(),
        second.iter().map(key).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_embedder_failure_degrades_to_structural() {
    let harness = user_project().await;
    let engine = harness.engine_with_embedder(Arc::new(FailingEmbedder::new(TEST_DIMENSION)));

    let results = engine
        .search("UserRepository", &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(results[0].name, "UserRepository");
    assert!(results
        .iter()
        .all(|r| r.search_method == SearchMethod::Structural && r.semantic_score.is_none()));
}

#[tokio::test]
async fn test_semantic_requires_initialize_without_lazy_init() {
    let harness = user_project().await;
    let engine = harness.engine().with_lazy_init(false);

    let err = engine
        .search("user", &SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotInitialized));
    assert!(err.is_retryable());

    engine.initialize().await.unwrap();
    assert!(engine.is_initialized());
    assert!(!engine
        .search("user", &SearchOptions::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cross_layer_finds_every_layer() {
    let harness = user_project().await;
    let engine = harness.engine();

    let result = engine
        .find_cross_layer_entity("User", &SearchOptions::default())
        .await
        .unwrap();

    let names: BTreeSet<&str> = result.matches.iter().map(|m| m.name.as_str()).collect();
    for expected in ["UserView", "UserController", "User", "UserRepository"] {
        assert!(names.contains(expected), "missing {}", expected);
    }
    assert!(!names.contains("Order"));

    for layer in [Layer::Frontend, Layer::Api, Layer::Domain, Layer::Data] {
        assert!(result.layer_counts.contains_key(&layer), "no {} match", layer);
    }
    assert_eq!(result.architectural_pattern, "Clean Architecture");
    assert!(result.total_confidence >= 0.5);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.contains("database")));

    let layers: Vec<Layer> = result.matches.iter().map(|m| m.layer).collect();
    let mut sorted = layers.clone();
    sorted.sort();
    assert_eq!(layers, sorted);
}

#[tokio::test]
async fn test_cross_layer_unknown_entity_is_empty() {
    let harness = user_project().await;
    let engine = harness.engine();

    let result = engine
        .find_cross_layer_entity("Invoice", &SearchOptions::default())
        .await
        .unwrap();
    assert!(result.matches.is_empty());
    assert_eq!(result.total_confidence, 0.0);
}
