// src/repository/faq.rs
// FAQ repository: language-scoped search and admin listing

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::error;

use super::{RepositoryOptions, VectorRepository, now_timestamp, quote_literal};
use crate::engine::{Entity, VectorEngine};
use crate::error::Result;
use crate::schema::FaqSchema;

const FAQ_FIELDS: &[&str] = &["id", "text", "metadata", "created_at"];
const PREVIEW_CHARS: usize = 200;

/// Default rendering of a question/answer pair into the stored text
pub const DEFAULT_TEXT_TEMPLATE: &str = "{question}\nA: {answer}";

/// FAQ hit returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Faq {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl Faq {
    pub fn question(&self) -> Option<&str> {
        self.metadata.get("question").and_then(Value::as_str)
    }

    pub fn answer(&self) -> Option<&str> {
        self.metadata.get("answer").and_then(Value::as_str)
    }
}

/// Stored FAQ as listed or fetched by id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub created_at: i64,
}

impl FaqEntry {
    fn from_entity(entity: Entity) -> Self {
        let text = entity
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let metadata = match entity.get("metadata") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let meta_str = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id: entity
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            question: meta_str("question"),
            answer: meta_str("answer"),
            created_at: entity.get("created_at").and_then(Value::as_i64).unwrap_or(0),
            text,
            metadata,
        }
    }

    fn into_preview(mut self) -> Self {
        if self.text.chars().count() > PREVIEW_CHARS {
            let cut: String = self.text.chars().take(PREVIEW_CHARS).collect();
            self.text = format!("{cut}...");
        }
        self
    }
}

/// FAQ row to ingest
#[derive(Debug, Clone)]
pub struct FaqRecord {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub language: String,
    pub category: Option<String>,
    pub embedding: Vec<f32>,
}

impl FaqRecord {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        language: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            question: question.into(),
            answer: answer.into(),
            language: language.into(),
            category: None,
            embedding,
        }
    }

    /// Stored text for this entry
    pub fn render_text(&self) -> String {
        DEFAULT_TEXT_TEMPLATE
            .replace("{question}", &self.question)
            .replace("{answer}", &self.answer)
    }

    fn into_entity(self, created_at: i64) -> Entity {
        let text = self.render_text();
        let mut metadata = Map::new();
        metadata.insert("question".into(), json!(self.question));
        metadata.insert("answer".into(), json!(self.answer));
        metadata.insert("language".into(), json!(self.language));
        if let Some(category) = self.category {
            metadata.insert("category".into(), json!(category));
        }
        metadata.insert("text_template".into(), json!(DEFAULT_TEXT_TEMPLATE));
        metadata.insert("embedding_source".into(), json!("question,answer"));

        let mut row = Map::new();
        row.insert("id".into(), json!(self.id));
        row.insert("text".into(), json!(text));
        row.insert("embedding".into(), json!(self.embedding));
        row.insert("metadata".into(), Value::Object(metadata));
        row.insert("created_at".into(), json!(created_at));
        row
    }
}

fn language_filter(language: &str) -> String {
    format!("metadata[\"language\"] == {}", quote_literal(language))
}

pub struct FaqRepository {
    inner: VectorRepository<FaqSchema>,
}

impl FaqRepository {
    pub fn new(engine: Arc<dyn VectorEngine>, schema: FaqSchema, options: RepositoryOptions) -> Self {
        Self {
            inner: VectorRepository::new(engine, schema, options),
        }
    }

    pub fn base(&self) -> &VectorRepository<FaqSchema> {
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
        language: Option<&str>,
    ) -> Result<Vec<Faq>> {
        let filter = language.filter(|l| !l.is_empty()).map(language_filter);
        let rows = self
            .inner
            .search(query_embedding, top_k, score_threshold, Some(FAQ_FIELDS), filter)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Faq {
                id: row.str_field("id").unwrap_or_default().to_string(),
                text: row.str_field("text").unwrap_or_default().to_string(),
                metadata: row.object_field("metadata"),
                score: row.score,
            })
            .collect())
    }

    pub async fn insert(&self, records: Vec<FaqRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let created_at = now_timestamp();
        self.inner
            .insert(records.into_iter().map(|r| r.into_entity(created_at)).collect())
            .await
    }

    /// Page of FAQs with 200-character text previews; empty on failure.
    pub async fn list_faqs(&self, skip: usize, limit: usize, language: Option<&str>) -> Vec<FaqEntry> {
        let mut filter = "created_at > 0".to_string();
        if let Some(language) = language.filter(|l| !l.is_empty()) {
            filter.push_str(" and ");
            filter.push_str(&language_filter(language));
        }

        match self.inner.query(&filter, Some(FAQ_FIELDS), limit, Some(skip)).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| FaqEntry::from_entity(row).into_preview())
                .collect(),
            Err(e) => {
                error!(collection = %self.inner.collection_name(), error = %e, "Failed to list FAQs");
                Vec::new()
            }
        }
    }

    pub async fn get_faq_by_id(&self, id: &str) -> Result<Option<FaqEntry>> {
        Ok(self
            .inner
            .get(id, Some(FAQ_FIELDS))
            .await?
            .map(FaqEntry::from_entity))
    }

    pub async fn count_faqs(&self) -> u64 {
        self.inner.count().await
    }

    pub async fn delete_faq(&self, id: &str) -> bool {
        self.inner.delete(id).await
    }

    pub async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}
