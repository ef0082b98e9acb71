// src/repository/mod.rs

//! Vector repositories.
//!
//! `VectorRepository<S>` wraps a shared `VectorEngine` for one collection described by a
//! `CollectionSchema`. It owns the distance-to-similarity conversion, the client-side
//! threshold filter, the recall deadline and the fail-open policy for delete, count and
//! health checks. The typed repositories (`KnowledgeRepository`, `FaqRepository`,
//! `HistoryRepository`) build on it.
//!
//! Search and insert errors propagate; recall sources decide what to do with them.

pub mod faq;
pub mod history;
pub mod knowledge;

pub use faq::{Faq, FaqEntry, FaqRecord, FaqRepository};
pub use history::{HistoryMessage, HistoryRepository, HistoryRecord};
pub use knowledge::{
    DocumentCount, DocumentFilter, DocumentPage, Knowledge, KnowledgeDocument,
    KnowledgeDocumentSummary, KnowledgeRecord, KnowledgeRepository,
};

use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::engine::{Entity, QueryRequest, SearchRequest, VectorEngine};
use crate::error::{RecallError, Result};
use crate::schema::{CollectionSchema, FieldType, PRIMARY_FIELD};

/// Convert an engine COSINE distance (0 = identical, 2 = opposite) into a similarity in
/// [0, 1] (1 = identical). Out-of-range distances are clamped.
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Quote a string for use inside an engine filter expression.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Primary-key equality filter
pub fn id_filter(id: &str) -> String {
    format!("{PRIMARY_FIELD} == {}", quote_literal(id))
}

pub(crate) fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Per-repository tuning shared by all collections
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// Similarity threshold used when a search passes none
    pub default_threshold: f32,
    /// Deadline for every single engine call made through the repository
    pub engine_timeout: Duration,
    pub nprobe: u32,
    /// Rows requested per query while scanning a whole collection
    pub scan_batch_size: usize,
    /// Rows after which a full scan stops early
    pub scan_max_rows: usize,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            default_threshold: 0.7,
            engine_timeout: Duration::from_millis(3000),
            nprobe: 16,
            scan_batch_size: 16384,
            scan_max_rows: 1_000_000,
        }
    }
}

impl RepositoryOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_threshold: settings.vector_score_threshold,
            engine_timeout: settings.recall_timeout(),
            nprobe: settings.search_nprobe,
            scan_batch_size: settings.count_batch_size,
            scan_max_rows: settings.count_max_scan,
        }
    }
}

/// A search hit after conversion: similarity score plus the requested fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub score: f32,
    pub fields: Entity,
}

impl ScoredRow {
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// JSON object field, empty when absent or not an object
    pub fn object_field(&self, name: &str) -> Map<String, Value> {
        match self.fields.get(name) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Entity fields with `score` merged in
    pub fn into_flat(self) -> Entity {
        let mut fields = self.fields;
        fields.insert("score".to_string(), Value::from(self.score));
        fields
    }
}

/// Generic repository over one schema-described collection.
pub struct VectorRepository<S: CollectionSchema> {
    engine: Arc<dyn VectorEngine>,
    schema: S,
    options: RepositoryOptions,
}

impl<S: CollectionSchema> VectorRepository<S> {
    pub fn new(engine: Arc<dyn VectorEngine>, schema: S, options: RepositoryOptions) -> Self {
        Self {
            engine,
            schema,
            options,
        }
    }

    pub fn collection_name(&self) -> &str {
        self.schema.collection_name()
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    /// Run one engine call under `engine_timeout`.
    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let name = self.collection_name();
        let deadline = self.options.engine_timeout;
        tokio::time::timeout(deadline, call).await.map_err(|_| {
            warn!(
                collection = %name,
                operation,
                timeout_ms = deadline.as_millis() as u64,
                "Engine call timed out"
            );
            RecallError::Timeout(format!(
                "{operation} on {name} exceeded {}ms",
                deadline.as_millis()
            ))
        })?
    }

    /// Create the collection if missing, otherwise make sure it is loaded.
    pub async fn initialize(&self) -> Result<()> {
        let name = self.collection_name();
        let outcome = async {
            if self
                .with_deadline("has_collection", self.engine.has_collection(name))
                .await?
            {
                info!(collection = %name, "Collection already exists");
                self.with_deadline("load_collection", self.engine.load_collection(name))
                    .await
            } else {
                self.with_deadline(
                    "create_collection",
                    self.engine.create_collection(name, self.schema.descriptor()),
                )
                .await?;
                info!(collection = %name, "Created collection");
                Ok(())
            }
        }
        .await;

        outcome.map_err(|e| {
            error!(collection = %name, error = %e, "Failed to initialize collection");
            RecallError::Connection(format!("failed to initialize collection {name}: {e}"))
        })
    }

    fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(RecallError::Validation("query embedding is empty".into()));
        }
        if let Some(dim) = self.schema.descriptor().dimension() {
            if embedding.len() != dim {
                return Err(RecallError::Validation(format!(
                    "embedding dimension mismatch for {}: expected {}, got {}",
                    self.collection_name(),
                    dim,
                    embedding.len()
                )));
            }
        }
        Ok(())
    }

    /// Nearest-neighbour search with the similarity threshold applied after conversion.
    ///
    /// Hits keep the engine's descending-relevance order. A search that outlives
    /// `engine_timeout` fails with `RecallError::Timeout` instead of returning nothing.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
        output_fields: Option<&[&str]>,
        filter_expr: Option<String>,
    ) -> Result<Vec<ScoredRow>> {
        self.check_embedding(query_embedding)?;
        if top_k == 0 {
            return Err(RecallError::Validation("top_k must be at least 1".into()));
        }

        let mut request = SearchRequest::new(query_embedding.to_vec(), top_k)
            .with_nprobe(self.options.nprobe)
            .with_filter(filter_expr);
        if let Some(fields) = output_fields {
            request = request.with_output_fields(fields);
        }

        let name = self.collection_name();
        let hits = self
            .with_deadline("search", self.engine.search(name, &request))
            .await?;

        let threshold = score_threshold.unwrap_or(self.options.default_threshold);
        let rows: Vec<ScoredRow> = hits
            .into_iter()
            .filter_map(|hit| {
                let score = similarity_from_distance(hit.distance);
                (score >= threshold).then_some(ScoredRow {
                    score,
                    fields: hit.entity,
                })
            })
            .collect();

        debug!(
            collection = %name,
            kept = rows.len(),
            top_k,
            threshold,
            "Search results above threshold"
        );
        Ok(rows)
    }

    /// Validate a row against every schema field without writing it
    pub(crate) fn check_row(&self, row: &Entity) -> Result<()> {
        let descriptor = self.schema.descriptor();
        for field in &descriptor.fields {
            let value = row.get(field.name).ok_or_else(|| {
                RecallError::Validation(format!(
                    "row for {} is missing field '{}'",
                    self.collection_name(),
                    field.name
                ))
            })?;

            match field.field_type {
                FieldType::FloatVector => {
                    let len = value.as_array().map(Vec::len).unwrap_or(0);
                    if Some(len) != field.dim {
                        return Err(RecallError::Validation(format!(
                            "field '{}' must be a vector of dimension {}, got {}",
                            field.name,
                            field.dim.unwrap_or(0),
                            len
                        )));
                    }
                }
                FieldType::VarChar => {
                    let text = value.as_str().ok_or_else(|| {
                        RecallError::Validation(format!("field '{}' must be a string", field.name))
                    })?;
                    if let Some(max) = field.max_length {
                        if text.chars().count() > max {
                            return Err(RecallError::Validation(format!(
                                "field '{}' exceeds {} characters",
                                field.name, max
                            )));
                        }
                    }
                }
                FieldType::Int64 => {
                    if !value.is_i64() {
                        return Err(RecallError::Validation(format!(
                            "field '{}' must be an integer",
                            field.name
                        )));
                    }
                }
                FieldType::Json => {}
            }
        }
        Ok(())
    }

    /// Insert rows. An empty batch returns 0 without touching the engine.
    pub async fn insert(&self, rows: Vec<Entity>) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            self.check_row(row)?;
        }

        let name = self.collection_name();
        let inserted = self
            .with_deadline("insert", self.engine.insert(name, rows))
            .await?;
        info!(collection = %name, inserted, "Inserted records");
        Ok(inserted)
    }

    pub async fn query(
        &self,
        filter_expr: &str,
        output_fields: Option<&[&str]>,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<Vec<Entity>> {
        let mut request = QueryRequest::new(filter_expr, limit);
        if let Some(fields) = output_fields {
            request = request.with_output_fields(fields);
        }
        if let Some(offset) = offset {
            request = request.with_offset(offset);
        }

        let rows = self
            .with_deadline("query", self.engine.query(self.collection_name(), &request))
            .await?;
        debug!(collection = %self.collection_name(), rows = rows.len(), "Query");
        Ok(rows)
    }

    /// Fetch a single row by primary key
    pub async fn get(&self, id: &str, output_fields: Option<&[&str]>) -> Result<Option<Entity>> {
        let mut rows = self.query(&id_filter(id), output_fields, 1, None).await?;
        Ok(rows.pop())
    }

    /// Delete one row by id. Missing ids and engine failures both yield `false`.
    pub async fn delete(&self, id: &str) -> bool {
        let name = self.collection_name();
        match self.get(id, Some(&[PRIMARY_FIELD])).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(collection = %name, id, "Delete skipped, record not found");
                return false;
            }
            Err(e) => {
                error!(collection = %name, id, error = %e, "Failed to delete record");
                return false;
            }
        }

        match self.delete_where(&id_filter(id)).await {
            Ok(()) => {
                info!(collection = %name, id, "Deleted record");
                true
            }
            Err(e) => {
                error!(collection = %name, id, error = %e, "Failed to delete record");
                false
            }
        }
    }

    /// Unconditional delete by filter expression; errors propagate.
    pub(crate) async fn delete_where(&self, filter_expr: &str) -> Result<()> {
        self.with_deadline(
            "delete",
            self.engine.delete(self.collection_name(), filter_expr),
        )
        .await
    }

    /// Engine-reported row count; 0 on failure.
    pub async fn count(&self) -> u64 {
        let stats = self.with_deadline(
            "get_collection_stats",
            self.engine.get_collection_stats(self.collection_name()),
        );
        match stats.await {
            Ok(stats) => stats.row_count,
            Err(e) => {
                error!(collection = %self.collection_name(), error = %e, "Failed to get count");
                0
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        let exists = self.with_deadline(
            "has_collection",
            self.engine.has_collection(self.collection_name()),
        );
        match exists.await {
            Ok(exists) => exists,
            Err(e) => {
                error!(collection = %self.collection_name(), error = %e, "Health check failed");
                false
            }
        }
    }

    /// Page through every row matching `filter_expr`, `scan_batch_size` rows at a time,
    /// handing each batch to `visit`.
    ///
    /// Stops at the first short batch, or once `scan_max_rows` rows have been read; the
    /// second case is reported as truncated. Returns the number of rows read.
    async fn scan_batches<F>(
        &self,
        filter_expr: &str,
        output_fields: &[&str],
        mut visit: F,
    ) -> Result<(usize, bool)>
    where
        F: FnMut(Vec<Entity>),
    {
        let batch_size = self.options.scan_batch_size.max(1);
        let max_rows = self.options.scan_max_rows;
        let mut offset = 0usize;

        loop {
            let batch = self
                .query(filter_expr, Some(output_fields), batch_size, Some(offset))
                .await?;
            let fetched = batch.len();
            visit(batch);
            offset += fetched;

            if fetched < batch_size {
                return Ok((offset, false));
            }
            if offset >= max_rows {
                warn!(
                    collection = %self.collection_name(),
                    scanned = offset,
                    max_rows,
                    "Scan reached safety ceiling, result may be incomplete"
                );
                return Ok((offset, true));
            }
        }
    }

    /// Collect every matching row; see `scan_batches` for the stopping rules.
    pub(crate) async fn scan(
        &self,
        filter_expr: &str,
        output_fields: &[&str],
    ) -> Result<(Vec<Entity>, bool)> {
        let mut rows = Vec::new();
        let (_, truncated) = self
            .scan_batches(filter_expr, output_fields, |batch| rows.extend(batch))
            .await?;
        Ok((rows, truncated))
    }

    /// Count matching rows batch by batch without keeping them.
    pub(crate) async fn scan_count(&self, filter_expr: &str) -> Result<(usize, bool)> {
        self.scan_batches(filter_expr, &[PRIMARY_FIELD], drop).await
    }
}
