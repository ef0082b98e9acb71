// src/recall/sources/history.rs
// Past conversation recall, scoped to the request session when one is given

use async_trait::async_trait;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::recall::source::RecallSource;
use crate::recall::types::{RecallHit, RecallRequest};
use crate::repository::{HistoryMessage, HistoryRepository};

pub struct HistoryRecallSource {
    repository: Arc<HistoryRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    score_threshold: Option<f32>,
}

impl HistoryRecallSource {
    pub fn new(repository: Arc<HistoryRepository>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository,
            embedder,
            score_threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    fn to_hit(&self, rank: usize, message: HistoryMessage) -> RecallHit {
        let score = message.score.unwrap_or(0.0);
        RecallHit::new(
            self.source_name(),
            score,
            format!("conversation history match (similarity: {score:.3})"),
            message.text,
        )
        .with_metadata("role", message.role)
        .with_metadata("session_id", message.session_id)
        .with_metadata("timestamp", message.timestamp)
        .with_metadata("rank", rank + 1)
        .with_metadata("message_id", message.id)
    }
}

#[async_trait]
impl RecallSource for HistoryRecallSource {
    fn source_name(&self) -> &str {
        "history"
    }

    async fn fetch(&self, request: &RecallRequest) -> Result<Vec<RecallHit>> {
        let embedding = request.embedding(self.embedder.as_ref()).await?;
        let results = self
            .repository
            .search(
                embedding,
                request.session_id(),
                request.top_k(),
                self.score_threshold,
            )
            .await?;

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(rank, message)| self.to_hit(rank, message))
            .collect())
    }
}
