// tests/recall_test.rs
// Recall sources and fusion end to end over the in-process engine

mod common;

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use common::{DIM, FakeEmbedder, FakeEngine, entity};
use ragbot::config::Settings;
use ragbot::embedding::EmbeddingProvider;
use ragbot::engine::VectorEngine;
use ragbot::error::{RecallError, Result};
use ragbot::recall::{
    FaqRecallSource, HistoryRecallSource, RecallHit, RecallOrchestrator, RecallRequest,
    RecallSource, VectorRecallSource,
};
use ragbot::repository::{
    FaqRepository, HistoryRepository, KnowledgeRepository, RepositoryOptions,
};
use ragbot::schema::{FaqSchema, HistorySchema, KnowledgeSchema};
use ragbot::state::RecallState;

fn knowledge(engine: Arc<FakeEngine>, options: RepositoryOptions) -> Arc<KnowledgeRepository> {
    Arc::new(KnowledgeRepository::new(
        engine as Arc<dyn VectorEngine>,
        KnowledgeSchema::new("knowledge_base", DIM),
        options,
    ))
}

fn request(query: &str) -> RecallRequest {
    RecallRequest::new(query, 3).unwrap()
}

struct PanickingSource;

#[async_trait]
impl RecallSource for PanickingSource {
    fn source_name(&self) -> &str {
        "panicking"
    }

    async fn fetch(&self, _request: &RecallRequest) -> Result<Vec<RecallHit>> {
        panic!("source bug");
    }
}

struct ErroringSource;

#[async_trait]
impl RecallSource for ErroringSource {
    fn source_name(&self) -> &str {
        "erroring"
    }

    async fn fetch(&self, _request: &RecallRequest) -> Result<Vec<RecallHit>> {
        Err(RecallError::Timeout("engine too slow".into()))
    }
}

// ============================================================================
// VECTOR SOURCE
// ============================================================================

#[tokio::test]
async fn test_vector_source_maps_hits_with_fallbacks() {
    let engine = Arc::new(FakeEngine::with_hits(vec![
        (
            0.1,
            entity(json!({
                "id": "k1",
                "text": "We open at nine.",
                "metadata": {"title": "Hours", "url": "https://shop.example/hours", "category": "store"}
            })),
        ),
        (
            0.3,
            entity(json!({"id": "k2", "text": "Closed on Sundays.", "metadata": {}})),
        ),
        (1.6, entity(json!({"id": "k3", "text": "Noise.", "metadata": {}}))),
    ]));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());
    let source = VectorRecallSource::new(knowledge(engine, RepositoryOptions::default()), embedder);

    let hits = source.acquire(&request("when do you open")).await;

    assert_eq!(hits.len(), 2);
    let first = &hits[0];
    assert_eq!(first.source, "vector");
    assert!((first.score - 0.95).abs() < 1e-6);
    assert_eq!(first.confidence, first.score);
    assert!(first.reason.contains("0.950"));
    assert_eq!(first.content, "We open at nine.");
    assert_eq!(first.metadata["title"], "Hours");
    assert_eq!(first.metadata["rank"], 1);
    assert_eq!(first.metadata["vector_id"], "k1");

    let second = &hits[1];
    assert_eq!(second.metadata["title"], "untitled document");
    assert_eq!(second.metadata["url"], "");
    assert_eq!(second.metadata["category"], "unknown category");
    assert_eq!(second.metadata["rank"], 2);
    assert!(second.score <= first.score);
}

#[tokio::test]
async fn test_vector_source_absorbs_engine_failure() {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());
    let source = VectorRecallSource::new(
        knowledge(Arc::new(FakeEngine::failing()), RepositoryOptions::default()),
        embedder,
    );

    assert!(source.fetch(&request("hours")).await.is_err());
    assert!(source.acquire(&request("hours")).await.is_empty());
}

#[tokio::test]
async fn test_vector_source_absorbs_embedding_failure() {
    let engine = Arc::new(FakeEngine::with_hits(vec![(
        0.1,
        entity(json!({"id": "k1", "text": "t", "metadata": {}})),
    )]));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::failing());
    let source = VectorRecallSource::new(knowledge(engine.clone(), RepositoryOptions::default()), embedder);

    assert!(source.acquire(&request("hours")).await.is_empty());
    assert_eq!(engine.calls_of("search"), 0);
}

#[tokio::test]
async fn test_vector_source_timeout_yields_empty() {
    let engine = Arc::new(FakeEngine::with_hits(vec![(
        0.1,
        entity(json!({"id": "k1", "text": "t", "metadata": {}})),
    )]));
    engine.set_search_delay(Duration::from_millis(500));
    let options = RepositoryOptions {
        engine_timeout: Duration::from_millis(20),
        ..RepositoryOptions::default()
    };
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());
    let source = VectorRecallSource::new(knowledge(engine, options), embedder);

    let err = source.fetch(&request("hours")).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(source.acquire(&request("hours")).await.is_empty());
}

#[tokio::test]
async fn test_vector_source_custom_threshold() {
    let engine = Arc::new(FakeEngine::with_hits(vec![
        (0.1, entity(json!({"id": "a", "text": "a", "metadata": {}}))),
        (0.5, entity(json!({"id": "b", "text": "b", "metadata": {}}))),
    ]));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());
    let source = VectorRecallSource::new(knowledge(engine, RepositoryOptions::default()), embedder)
        .with_threshold(0.5);

    assert_eq!(source.acquire(&request("hours")).await.len(), 2);
}

// ============================================================================
// FAQ / HISTORY SOURCES
// ============================================================================

#[tokio::test]
async fn test_faq_and_history_sources_map_metadata() {
    let engine = Arc::new(FakeEngine::with_hits(vec![(
        0.2,
        entity(json!({
            "id": "row-1",
            "text": "When do you open?\nA: At nine.",
            "metadata": {"question": "When do you open?", "answer": "At nine.", "language": "en"},
            "session_id": "s-1",
            "role": "user",
            "timestamp": 1700000000
        })),
    )]));
    let dyn_engine: Arc<dyn VectorEngine> = engine.clone();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());

    let faq = FaqRecallSource::new(
        Arc::new(FaqRepository::new(
            dyn_engine.clone(),
            FaqSchema::new("faq", DIM),
            RepositoryOptions::default(),
        )),
        embedder.clone(),
    );
    let history = HistoryRecallSource::new(
        Arc::new(HistoryRepository::new(
            dyn_engine,
            HistorySchema::new("conversation_history", DIM),
            RepositoryOptions::default(),
        )),
        embedder,
    );

    let request = request("opening").with_language("en").with_session("s-1");

    let faq_hits = faq.acquire(&request).await;
    assert_eq!(faq_hits.len(), 1);
    assert_eq!(faq_hits[0].source, "faq");
    assert_eq!(faq_hits[0].metadata["answer"], "At nine.");
    assert_eq!(faq_hits[0].metadata["category"], "unknown category");
    assert_eq!(faq_hits[0].metadata["faq_id"], "row-1");

    let history_hits = history.acquire(&request).await;
    assert_eq!(history_hits.len(), 1);
    assert_eq!(history_hits[0].source, "history");
    assert_eq!(history_hits[0].metadata["role"], "user");
    assert_eq!(history_hits[0].metadata["timestamp"], 1700000000);
    assert!((history_hits[0].score - 0.9).abs() < 1e-6);
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[tokio::test]
async fn test_failing_and_panicking_sources_are_isolated() {
    let engine = Arc::new(FakeEngine::with_hits(vec![
        (0.1, entity(json!({"id": "k1", "text": "first", "metadata": {}}))),
        (0.4, entity(json!({"id": "k2", "text": "second", "metadata": {}}))),
    ]));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());
    let vector = VectorRecallSource::new(knowledge(engine, RepositoryOptions::default()), embedder);

    let orchestrator = RecallOrchestrator::new()
        .with_source(Arc::new(ErroringSource))
        .with_source(Arc::new(PanickingSource))
        .with_source(Arc::new(vector));

    let hits = orchestrator.recall(&request("hours")).await;

    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.source == "vector"));
    assert_eq!(hits[0].content, "first");
    assert_eq!(hits[1].content, "second");
}

fn delayed_source(distance: f32, text: &str, delay: Option<Duration>) -> VectorRecallSource {
    let engine = Arc::new(FakeEngine::with_hits(vec![(
        distance,
        entity(json!({"id": text, "text": text, "metadata": {}})),
    )]));
    if let Some(delay) = delay {
        engine.set_search_delay(delay);
    }
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());
    VectorRecallSource::new(knowledge(engine, RepositoryOptions::default()), embedder)
}

#[tokio::test]
async fn test_fused_order_ignores_completion_order() {
    let orchestrator = RecallOrchestrator::new()
        .with_source(Arc::new(delayed_source(
            0.1,
            "slow-best",
            Some(Duration::from_millis(150)),
        )))
        .with_source(Arc::new(ErroringSource))
        .with_source(Arc::new(delayed_source(0.4, "fast-runner-up", None)));

    let hits = orchestrator.recall(&request("hours")).await;

    let contents: Vec<_> = hits.iter().map(|h| h.content.as_str()).collect();
    assert_eq!(contents, vec!["slow-best", "fast-runner-up"]);
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn test_score_ties_follow_registration_not_completion() {
    let orchestrator = RecallOrchestrator::new()
        .with_source(Arc::new(delayed_source(
            0.2,
            "registered-first",
            Some(Duration::from_millis(150)),
        )))
        .with_source(Arc::new(delayed_source(0.2, "finished-first", None)));

    let hits = orchestrator.recall(&request("hours")).await;

    let contents: Vec<_> = hits.iter().map(|h| h.content.as_str()).collect();
    assert_eq!(contents, vec!["registered-first", "finished-first"]);
}

#[tokio::test]
async fn test_embedding_shared_across_sources() {
    let engine = Arc::new(FakeEngine::with_hits(vec![(
        0.1,
        entity(json!({"id": "k1", "text": "t", "metadata": {}})),
    )]));
    let counting = Arc::new(FakeEmbedder::default());
    let embedder: Arc<dyn EmbeddingProvider> = counting.clone();
    let dyn_engine: Arc<dyn VectorEngine> = engine.clone();

    let orchestrator = RecallOrchestrator::new()
        .with_source(Arc::new(VectorRecallSource::new(
            knowledge(engine, RepositoryOptions::default()),
            embedder.clone(),
        )))
        .with_source(Arc::new(FaqRecallSource::new(
            Arc::new(FaqRepository::new(
                dyn_engine,
                FaqSchema::new("faq", DIM),
                RepositoryOptions::default(),
            )),
            embedder,
        )));

    let hits = orchestrator.recall(&request("hours")).await;

    assert_eq!(hits.len(), 2);
    assert_eq!(counting.call_count(), 1);
    // Equal scores: the earlier-registered source comes first
    assert_eq!(hits[0].source, "vector");
    assert_eq!(hits[1].source, "faq");
}

#[tokio::test]
async fn test_state_wires_all_sources() {
    let settings = Settings {
        embedding_dim: DIM,
        ..Settings::default()
    };
    let engine = Arc::new(FakeEngine::new());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder::default());
    let state = RecallState::with_components(&settings, engine.clone(), embedder);

    assert_eq!(
        state.orchestrator.source_names(),
        vec!["vector", "faq", "history"]
    );

    state.initialize_collections().await.unwrap();
    assert_eq!(engine.calls_of("create_collection"), 3);
    assert!(state.health().await.iter().all(|(_, ok)| *ok));
    assert!(state.orchestrator.recall(&request("hours")).await.is_empty());
}
