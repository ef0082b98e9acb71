// src/engine/mod.rs

//! Vector engine seam.
//!
//! `VectorEngine` is the remote vector database as the repositories see it: collection
//! lifecycle, approximate nearest-neighbour search, scalar queries, insert and delete.
//! Engine hits still carry raw COSINE distances here; conversion to similarity happens in
//! the repository layer and nowhere else.

pub mod milvus;

pub use milvus::MilvusClient;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::schema::{MetricType, SchemaDescriptor, VECTOR_FIELD};

/// A single stored row as returned by the engine: field name to JSON value
pub type Entity = Map<String, Value>;

/// Raw search result: the engine's distance plus the requested output fields
#[derive(Debug, Clone, PartialEq)]
pub struct EngineHit {
    pub distance: f32,
    pub entity: Entity,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub anns_field: String,
    pub metric_type: MetricType,
    pub nprobe: u32,
    pub limit: usize,
    pub output_fields: Vec<String>,
    pub filter: Option<String>,
}

impl SearchRequest {
    pub fn new(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            vector,
            anns_field: VECTOR_FIELD.to_string(),
            metric_type: MetricType::Cosine,
            nprobe: 16,
            limit,
            output_fields: vec!["*".to_string()],
            filter: None,
        }
    }

    pub fn with_output_fields(mut self, fields: &[&str]) -> Self {
        self.output_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_nprobe(mut self, nprobe: u32) -> Self {
        self.nprobe = nprobe;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub filter: String,
    pub output_fields: Vec<String>,
    pub limit: usize,
    pub offset: Option<usize>,
}

impl QueryRequest {
    pub fn new(filter: impl Into<String>, limit: usize) -> Self {
        Self {
            filter: filter.into(),
            output_fields: vec!["*".to_string()],
            limit,
            offset: None,
        }
    }

    pub fn with_output_fields(mut self, fields: &[&str]) -> Self {
        self.output_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub row_count: u64,
}

/// Remote vector database. Implementations must be safe to call from many concurrent
/// tasks; repositories hold one shared instance and add no locking of their own.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    async fn has_collection(&self, collection: &str) -> Result<bool>;

    /// Create the collection and its vector index from a schema descriptor
    async fn create_collection(&self, collection: &str, schema: &SchemaDescriptor) -> Result<()>;

    /// Load the collection into serving memory
    async fn load_collection(&self, collection: &str) -> Result<()>;

    /// Nearest-neighbour search, hits in descending relevance order
    async fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<EngineHit>>;

    /// Scalar query by filter expression
    async fn query(&self, collection: &str, request: &QueryRequest) -> Result<Vec<Entity>>;

    /// Insert rows; returns the number of rows the engine accepted
    async fn insert(&self, collection: &str, rows: Vec<Entity>) -> Result<usize>;

    /// Delete rows matching a filter expression
    async fn delete(&self, collection: &str, filter: &str) -> Result<()>;

    async fn get_collection_stats(&self, collection: &str) -> Result<CollectionStats>;

    async fn list_collections(&self) -> Result<Vec<String>>;
}
