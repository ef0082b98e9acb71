// src/repository/history.rs
// Conversation history repository

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use super::{RepositoryOptions, ScoredRow, VectorRepository, now_timestamp, quote_literal};
use crate::engine::{Entity, VectorEngine};
use crate::error::Result;
use crate::schema::HistorySchema;

const SEARCH_FIELDS: &[&str] = &["id", "session_id", "role", "text", "timestamp"];
const SESSION_FIELDS: &[&str] = &["id", "session_id", "role", "text", "timestamp"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryMessage {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub text: String,
    pub timestamp: i64,
    /// Similarity for search results; `None` for session listings
    pub score: Option<f32>,
}

impl HistoryMessage {
    fn from_entity(entity: &Entity, score: Option<f32>) -> Self {
        let text_of = |key: &str| {
            entity
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            id: text_of("id"),
            session_id: text_of("session_id"),
            role: text_of("role"),
            text: text_of("text"),
            timestamp: entity.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
            score,
        }
    }

    fn from_scored(row: &ScoredRow) -> Self {
        Self::from_entity(&row.fields, Some(row.score))
    }
}

/// Message to persist. A missing timestamp is stamped with the current time.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub timestamp: Option<i64>,
}

impl HistoryRecord {
    pub fn new(
        session_id: impl Into<String>,
        role: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role: role.into(),
            text: text.into(),
            embedding,
            timestamp: None,
        }
    }

    fn into_entity(self, now: i64) -> Entity {
        let mut row = Map::new();
        row.insert("id".into(), json!(self.id));
        row.insert("session_id".into(), json!(self.session_id));
        row.insert("role".into(), json!(self.role));
        row.insert("text".into(), json!(self.text));
        row.insert("embedding".into(), json!(self.embedding));
        row.insert("timestamp".into(), json!(self.timestamp.unwrap_or(now)));
        row
    }
}

fn session_filter(session_id: &str) -> String {
    format!("session_id == {}", quote_literal(session_id))
}

pub struct HistoryRepository {
    inner: VectorRepository<HistorySchema>,
}

impl HistoryRepository {
    pub fn new(
        engine: Arc<dyn VectorEngine>,
        schema: HistorySchema,
        options: RepositoryOptions,
    ) -> Self {
        Self {
            inner: VectorRepository::new(engine, schema, options),
        }
    }

    pub fn base(&self) -> &VectorRepository<HistorySchema> {
        &self.inner
    }

    pub async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    /// Similar past messages, optionally scoped to one session
    pub async fn search(
        &self,
        query_embedding: &[f32],
        session_id: Option<&str>,
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<HistoryMessage>> {
        let filter = session_id.filter(|s| !s.is_empty()).map(session_filter);
        let rows = self
            .inner
            .search(query_embedding, top_k, score_threshold, Some(SEARCH_FIELDS), filter)
            .await?;
        Ok(rows.iter().map(HistoryMessage::from_scored).collect())
    }

    /// Messages of one session, oldest first
    pub async fn search_by_session(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>> {
        let rows = self
            .inner
            .query(&session_filter(session_id), Some(SESSION_FIELDS), limit, None)
            .await?;

        let mut messages: Vec<HistoryMessage> = rows
            .iter()
            .map(|row| HistoryMessage::from_entity(row, None))
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    pub async fn insert(&self, records: Vec<HistoryRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let now = now_timestamp();
        self.inner
            .insert(records.into_iter().map(|r| r.into_entity(now)).collect())
            .await
    }

    pub async fn delete(&self, id: &str) -> bool {
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

    #[test]
    fn test_record_keeps_caller_timestamp() {
        let mut record = HistoryRecord::new("s1", "user", "hi", vec![0.0; 2]);
        record.timestamp = Some(42);
        assert_eq!(record.into_entity(1000)["timestamp"], 42);

        let record = HistoryRecord::new("s1", "assistant", "hello", vec![0.0; 2]);
        assert_eq!(record.into_entity(1000)["timestamp"], 1000);
    }

    #[test]
    fn test_session_filter() {
        assert_eq!(session_filter("abc"), "session_id == \"abc\"");
    }
}
