// src/recall/sources/vector.rs
// Knowledge base similarity recall

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::recall::source::RecallSource;
use crate::recall::types::{RecallHit, RecallRequest};
use crate::repository::{Knowledge, KnowledgeRepository};

pub struct VectorRecallSource {
    repository: Arc<KnowledgeRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    score_threshold: Option<f32>,
}

impl VectorRecallSource {
    pub fn new(repository: Arc<KnowledgeRepository>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository,
            embedder,
            score_threshold: None,
        }
    }

    /// Override the repository's default similarity threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    fn to_hit(&self, rank: usize, knowledge: Knowledge) -> RecallHit {
        let meta = &knowledge.metadata;
        let text_or = |key: &str, fallback: &str| {
            meta.get(key)
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };

        RecallHit::new(
            self.source_name(),
            knowledge.score,
            format!("vector similarity match (similarity: {:.3})", knowledge.score),
            knowledge.text.clone(),
        )
        .with_metadata("title", text_or("title", "untitled document"))
        .with_metadata("url", text_or("url", ""))
        .with_metadata("category", text_or("category", "unknown category"))
        .with_metadata("rank", rank + 1)
        .with_metadata("vector_id", knowledge.id.clone())
    }
}

#[async_trait]
impl RecallSource for VectorRecallSource {
    fn source_name(&self) -> &str {
        "vector"
    }

    async fn fetch(&self, request: &RecallRequest) -> Result<Vec<RecallHit>> {
        let embedding = request.embedding(self.embedder.as_ref()).await?;
        let results = self
            .repository
            .search(embedding, request.top_k(), self.score_threshold)
            .await?;

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(rank, knowledge)| self.to_hit(rank, knowledge))
            .collect())
    }
}
