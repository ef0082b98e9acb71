// src/repository/knowledge.rs
// Knowledge base repository: search, ingestion, batched counting and admin listing

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{RepositoryOptions, VectorRepository, id_filter, now_timestamp};
use crate::embedding::EmbeddingProvider;
use crate::engine::{Entity, VectorEngine};
use crate::error::{RecallError, Result};
use crate::schema::KnowledgeSchema;

const SEARCH_FIELDS: &[&str] = &["id", "text", "metadata", "created_at"];
const DOCUMENT_FIELDS: &[&str] = &["id", "text", "metadata", "created_at"];
const FULL_ROW_FIELDS: &[&str] = &["id", "text", "embedding", "metadata", "created_at"];
const EXISTS_FILTER: &str = "created_at > 0";

/// Knowledge chunk returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Knowledge {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Stored knowledge row as read back by id or listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub created_at: i64,
}

impl KnowledgeDocument {
    fn from_entity(entity: Entity) -> Self {
        Self {
            id: string_field(&entity, "id"),
            text: string_field(&entity, "text"),
            metadata: object_field(&entity, "metadata"),
            created_at: entity.get("created_at").and_then(Value::as_i64).unwrap_or(0),
        }
    }
}

/// Row to ingest. `created_at` is stamped at insert time.
#[derive(Debug, Clone)]
pub struct KnowledgeRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl KnowledgeRecord {
    /// New record with a fresh UUID
    pub fn new(text: impl Into<String>, embedding: Vec<f32>, metadata: Map<String, Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            embedding,
            metadata,
        }
    }

    fn into_entity(self, created_at: i64) -> Entity {
        let mut row = Map::new();
        row.insert("id".into(), json!(self.id));
        row.insert("text".into(), json!(self.text));
        row.insert("embedding".into(), json!(self.embedding));
        row.insert("metadata".into(), Value::Object(self.metadata));
        row.insert("created_at".into(), json!(created_at));
        row
    }
}

/// Result of a full-collection count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCount {
    pub total: u64,
    /// True when the scan stopped at the safety ceiling
    pub truncated: bool,
}

/// Optional in-memory filters for document listing
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Case-insensitive substring of the text or title
    pub keyword: Option<String>,
    pub status: Option<String>,
    /// Every requested tag must be present on the document
    pub tags: Vec<String>,
}

impl DocumentFilter {
    pub fn matches(&self, summary: &KnowledgeDocumentSummary, text: &str) -> bool {
        if let Some(keyword) = self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            let needle = keyword.to_lowercase();
            if !text.to_lowercase().contains(&needle)
                && !summary.title.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if let Some(status) = &self.status {
            if &summary.status != status {
                return false;
            }
        }

        self.tags.iter().all(|tag| summary.tags.contains(tag))
    }
}

/// Admin-facing view of a stored document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeDocumentSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub version: String,
    pub status: String,
    pub chunk_count: u64,
    pub updated_at: i64,
    pub created_by: Option<String>,
    pub metadata: Map<String, Value>,
}

impl KnowledgeDocumentSummary {
    pub fn from_document(document: &KnowledgeDocument) -> Self {
        let meta = &document.metadata;
        let text_of = |key: &str| meta.get(key).and_then(Value::as_str).map(String::from);

        let tags = meta
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: document.id.clone(),
            title: text_of("title").unwrap_or_else(|| "untitled document".to_string()),
            category: text_of("category").unwrap_or_else(|| "unknown category".to_string()),
            tags,
            version: text_of("version").unwrap_or_else(|| "1.0".to_string()),
            status: text_of("status").unwrap_or_else(|| "draft".to_string()),
            chunk_count: meta.get("chunk_count").and_then(Value::as_u64).unwrap_or(1),
            updated_at: meta
                .get("updated_at")
                .and_then(Value::as_i64)
                .unwrap_or(document.created_at),
            created_by: text_of("created_by"),
            metadata: meta.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<KnowledgeDocumentSummary>,
    /// Matching documents across all pages
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub truncated: bool,
}

fn string_field(entity: &Entity, name: &str) -> String {
    entity
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn object_field(entity: &Entity, name: &str) -> Map<String, Value> {
    match entity.get(name) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

pub struct KnowledgeRepository {
    inner: VectorRepository<KnowledgeSchema>,
}

impl KnowledgeRepository {
    pub fn new(
        engine: Arc<dyn VectorEngine>,
        schema: KnowledgeSchema,
        options: RepositoryOptions,
    ) -> Self {
        Self {
            inner: VectorRepository::new(engine, schema, options),
        }
    }

    pub fn base(&self) -> &VectorRepository<KnowledgeSchema> {
        &self.inner
    }

    pub async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<Knowledge>> {
        let rows = self
            .inner
            .search(query_embedding, top_k, score_threshold, Some(SEARCH_FIELDS), None)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Knowledge {
                id: row.str_field("id").unwrap_or_default().to_string(),
                text: row.str_field("text").unwrap_or_default().to_string(),
                metadata: row.object_field("metadata"),
                score: row.score,
            })
            .collect())
    }

    pub async fn insert(&self, records: Vec<KnowledgeRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let created_at = now_timestamp();
        let rows = records
            .into_iter()
            .map(|r| r.into_entity(created_at))
            .collect();
        self.inner.insert(rows).await
    }

    /// Exact row count by paging through the collection in batches.
    ///
    /// The engine caps rows per query, so stats alone are not trusted here. Scanning stops
    /// at the configured ceiling and reports `truncated`.
    pub async fn count_documents_detailed(&self) -> Result<DocumentCount> {
        let (total, truncated) = self.inner.scan_count(EXISTS_FILTER).await?;
        Ok(DocumentCount {
            total: total as u64,
            truncated,
        })
    }

    /// Batched document count; 0 on failure.
    pub async fn count_documents(&self) -> u64 {
        match self.count_documents_detailed().await {
            Ok(count) => {
                debug!(total = count.total, truncated = count.truncated, "Counted documents");
                count.total
            }
            Err(e) => {
                error!(collection = %self.inner.collection_name(), error = %e, "Failed to count documents");
                0
            }
        }
    }

    /// Filtered, newest-first page of document summaries. `page` is 1-based.
    ///
    /// Filters run in memory after the scan: metadata shape varies per document and the
    /// engine's filter language cannot express tag supersets.
    pub async fn list_documents(
        &self,
        filter: &DocumentFilter,
        page: usize,
        page_size: usize,
    ) -> Result<DocumentPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let (rows, truncated) = self.inner.scan(EXISTS_FILTER, DOCUMENT_FIELDS).await?;

        let mut matching: Vec<KnowledgeDocumentSummary> = rows
            .into_iter()
            .map(KnowledgeDocument::from_entity)
            .filter_map(|doc| {
                let summary = KnowledgeDocumentSummary::from_document(&doc);
                filter.matches(&summary, &doc.text).then_some(summary)
            })
            .collect();

        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len();
        let documents = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        Ok(DocumentPage {
            documents,
            total,
            page,
            page_size,
            truncated,
        })
    }

    pub async fn get_document_by_id(&self, id: &str) -> Result<Option<KnowledgeDocument>> {
        Ok(self
            .inner
            .get(id, Some(DOCUMENT_FIELDS))
            .await?
            .map(KnowledgeDocument::from_entity))
    }

    /// Replace a document's content: re-embed, delete the old row, insert under the same id.
    ///
    /// Returns `Ok(false)` when the document does not exist. The replacement row is embedded
    /// and validated before anything is deleted; if the insert still fails, the original
    /// row is written back and the insert error is returned.
    pub async fn update_document(
        &self,
        id: &str,
        content: &str,
        metadata: Option<Map<String, Value>>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<bool> {
        let Some(original) = self.inner.get(id, Some(FULL_ROW_FIELDS)).await? else {
            return Ok(false);
        };
        if content.trim().is_empty() {
            return Err(RecallError::Validation("document content is empty".into()));
        }

        let existing = KnowledgeDocument::from_entity(original.clone());
        let embedding = embedder.embed(content).await?;

        let mut merged = existing.metadata;
        if let Some(updates) = metadata {
            merged.extend(updates);
        }
        merged.insert("updated_at".into(), json!(now_timestamp()));

        let replacement = KnowledgeRecord {
            id: id.to_string(),
            text: content.to_string(),
            embedding,
            metadata: merged,
        }
        .into_entity(existing.created_at);
        self.inner.check_row(&replacement)?;

        let name = self.inner.collection_name();
        self.inner.delete_where(&id_filter(id)).await?;

        if let Err(e) = self.inner.insert(vec![replacement]).await {
            error!(collection = %name, id, error = %e, "Update insert failed, restoring original");
            if let Err(restore) = self.inner.insert(vec![original]).await {
                warn!(collection = %name, id, error = %restore, "Failed to restore original document");
            }
            return Err(e);
        }

        info!(collection = %name, id, "Updated document");
        Ok(true)
    }

    pub async fn delete_document(&self, id: &str) -> bool {
        self.inner.delete(id).await
    }

    pub async fn count(&self) -> u64 {
        self.inner.count().await
    }

    pub async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, text: &str, metadata: Value, created_at: i64) -> KnowledgeDocument {
        KnowledgeDocument {
            id: id.to_string(),
            text: text.to_string(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            created_at,
        }
    }

    #[test]
    fn test_summary_fallbacks() {
        let doc = document("d1", "body", json!({}), 100);
        let summary = KnowledgeDocumentSummary::from_document(&doc);

        assert_eq!(summary.title, "untitled document");
        assert_eq!(summary.category, "unknown category");
        assert_eq!(summary.status, "draft");
        assert_eq!(summary.chunk_count, 1);
        assert_eq!(summary.updated_at, 100);
        assert!(summary.tags.is_empty());
        assert!(summary.created_by.is_none());
    }

    #[test]
    fn test_summary_reads_metadata() {
        let doc = document(
            "d2",
            "body",
            json!({
                "title": "Returns",
                "tags": ["policy", "shipping"],
                "status": "published",
                "chunk_count": 4,
                "updated_at": 500,
                "created_by": "admin"
            }),
            100,
        );
        let summary = KnowledgeDocumentSummary::from_document(&doc);

        assert_eq!(summary.title, "Returns");
        assert_eq!(summary.tags, vec!["policy", "shipping"]);
        assert_eq!(summary.status, "published");
        assert_eq!(summary.chunk_count, 4);
        assert_eq!(summary.updated_at, 500);
        assert_eq!(summary.created_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_tag_filter_requires_superset() {
        let filter = DocumentFilter {
            tags: vec!["a".into(), "b".into()],
            ..DocumentFilter::default()
        };

        let abc = document("1", "x", json!({"tags": ["a", "b", "c"]}), 1);
        let a = document("2", "x", json!({"tags": ["a"]}), 1);

        assert!(filter.matches(&KnowledgeDocumentSummary::from_document(&abc), &abc.text));
        assert!(!filter.matches(&KnowledgeDocumentSummary::from_document(&a), &a.text));
    }

    #[test]
    fn test_keyword_and_status_filters() {
        let doc = document("1", "Store opening hours", json!({"status": "published"}), 1);
        let summary = KnowledgeDocumentSummary::from_document(&doc);

        let keyword = DocumentFilter {
            keyword: Some("OPENING".into()),
            ..DocumentFilter::default()
        };
        assert!(keyword.matches(&summary, &doc.text));

        let miss = DocumentFilter {
            keyword: Some("refund".into()),
            ..DocumentFilter::default()
        };
        assert!(!miss.matches(&summary, &doc.text));

        let draft_only = DocumentFilter {
            status: Some("draft".into()),
            ..DocumentFilter::default()
        };
        assert!(!draft_only.matches(&summary, &doc.text));
    }

    #[test]
    fn test_record_gets_uuid_and_timestamp() {
        let record = KnowledgeRecord::new("text", vec![0.0; 4], Map::new());
        assert_eq!(record.id.len(), 36);
        let row = record.into_entity(1234);
        assert_eq!(row["created_at"], 1234);
        assert_eq!(row["embedding"].as_array().map(Vec::len), Some(4));
    }
}
