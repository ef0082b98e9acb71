// tests/common/mod.rs
// In-process fakes for the engine and embedding seams

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use ragbot::embedding::EmbeddingProvider;
use ragbot::engine::{
    CollectionStats, EngineHit, Entity, QueryRequest, SearchRequest, VectorEngine,
};
use ragbot::error::{RecallError, Result};
use ragbot::schema::SchemaDescriptor;

pub const DIM: usize = 4;

/// Vector engine double: records every call and serves canned data.
#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<String>>,
    pub collections: Mutex<HashSet<String>>,
    pub search_hits: Mutex<Vec<EngineHit>>,
    /// Served in order by non-id queries before falling back to `rows`
    pub query_batches: Mutex<VecDeque<Vec<Entity>>>,
    pub queries: Mutex<Vec<QueryRequest>>,
    pub rows: Mutex<Vec<Entity>>,
    pub row_count: Mutex<u64>,
    pub search_delay: Mutex<Option<Duration>>,
    pub query_delay: Mutex<Option<Duration>>,
    pub fail: AtomicBool,
    /// Fails only the next insert, then resets
    pub fail_next_insert: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let engine = Self::default();
        engine.fail.store(true, Ordering::SeqCst);
        engine
    }

    pub fn with_hits(hits: Vec<(f32, Entity)>) -> Self {
        let engine = Self::default();
        *engine.search_hits.lock().unwrap() = hits
            .into_iter()
            .map(|(distance, entity)| EngineHit { distance, entity })
            .collect();
        engine
    }

    pub fn with_rows(rows: Vec<Entity>) -> Self {
        let engine = Self::default();
        *engine.rows.lock().unwrap() = rows;
        engine
    }

    pub fn push_batch(&self, batch: Vec<Entity>) {
        self.query_batches.lock().unwrap().push_back(batch);
    }

    pub fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_of(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    fn record(&self, op: &str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecallError::Connection("engine unreachable".into()));
        }
        Ok(())
    }
}

// Extracts the id from `id == "<id>"`
fn id_from_filter(filter: &str) -> Option<String> {
    filter
        .strip_prefix("id == \"")
        .and_then(|rest| rest.strip_suffix('"'))
        .map(String::from)
}

#[async_trait]
impl VectorEngine for FakeEngine {
    async fn has_collection(&self, collection: &str) -> Result<bool> {
        self.record("has_collection")?;
        Ok(self.collections.lock().unwrap().contains(collection))
    }

    async fn create_collection(&self, collection: &str, _schema: &SchemaDescriptor) -> Result<()> {
        self.record("create_collection")?;
        self.collections.lock().unwrap().insert(collection.to_string());
        Ok(())
    }

    async fn load_collection(&self, _collection: &str) -> Result<()> {
        self.record("load_collection")
    }

    async fn search(&self, _collection: &str, request: &SearchRequest) -> Result<Vec<EngineHit>> {
        self.record("search")?;
        let delay = *self.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let hits = self.search_hits.lock().unwrap();
        Ok(hits.iter().take(request.limit).cloned().collect())
    }

    async fn query(&self, _collection: &str, request: &QueryRequest) -> Result<Vec<Entity>> {
        self.record("query")?;
        self.queries.lock().unwrap().push(request.clone());
        let delay = *self.query_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let rows = self.rows.lock().unwrap();
        if let Some(id) = id_from_filter(&request.filter) {
            return Ok(rows
                .iter()
                .filter(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
                .take(request.limit)
                .cloned()
                .collect());
        }

        if let Some(batch) = self.query_batches.lock().unwrap().pop_front() {
            return Ok(batch);
        }

        let offset = request.offset.unwrap_or(0);
        Ok(rows
            .iter()
            .skip(offset)
            .take(request.limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, _collection: &str, rows: Vec<Entity>) -> Result<usize> {
        self.record("insert")?;
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(RecallError::Engine {
                code: 1100,
                message: "insert rejected".into(),
            });
        }
        let count = rows.len();
        self.rows.lock().unwrap().extend(rows);
        Ok(count)
    }

    async fn delete(&self, _collection: &str, filter: &str) -> Result<()> {
        self.record("delete")?;
        if let Some(id) = id_from_filter(filter) {
            self.rows
                .lock()
                .unwrap()
                .retain(|r| r.get("id").and_then(Value::as_str) != Some(id.as_str()));
        }
        Ok(())
    }

    async fn get_collection_stats(&self, _collection: &str) -> Result<CollectionStats> {
        self.record("get_collection_stats")?;
        Ok(CollectionStats {
            row_count: *self.row_count.lock().unwrap(),
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.record("list_collections")?;
        Ok(self.collections.lock().unwrap().iter().cloned().collect())
    }
}

/// Embedder double returning a fixed unit vector
#[derive(Default)]
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
    /// Length of the returned vector when it should not match `DIM`
    pub output_dim: Option<usize>,
}

impl FakeEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_output_dim(dim: usize) -> Self {
        Self {
            output_dim: Some(dim),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RecallError::Embedding("provider down".into()));
        }
        let mut vector = vec![0.0; self.output_dim.unwrap_or(DIM)];
        vector[0] = 1.0;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

pub fn query_vector() -> Vec<f32> {
    vec![0.5; DIM]
}

pub fn entity(value: Value) -> Entity {
    value.as_object().cloned().unwrap_or_else(Map::new)
}

pub fn knowledge_row(id: &str, text: &str, metadata: Value, created_at: i64) -> Entity {
    entity(json!({
        "id": id,
        "text": text,
        "embedding": vec![0.1f32; DIM],
        "metadata": metadata,
        "created_at": created_at,
    }))
}

pub fn id_rows(count: usize, prefix: &str) -> Vec<Entity> {
    (0..count)
        .map(|i| entity(json!({ "id": format!("{prefix}-{i}") })))
        .collect()
}
