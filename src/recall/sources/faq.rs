// src/recall/sources/faq.rs
// FAQ recall, scoped to the request language when one is given

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::recall::source::RecallSource;
use crate::recall::types::{RecallHit, RecallRequest};
use crate::repository::{Faq, FaqRepository};

pub struct FaqRecallSource {
    repository: Arc<FaqRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    score_threshold: Option<f32>,
}

impl FaqRecallSource {
    pub fn new(repository: Arc<FaqRepository>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
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

    fn to_hit(&self, rank: usize, faq: Faq) -> RecallHit {
        let text_or = |key: &str, fallback: &str| {
            faq.metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };

        RecallHit::new(
            self.source_name(),
            faq.score,
            format!("faq match (similarity: {:.3})", faq.score),
            faq.text.clone(),
        )
        .with_metadata("question", text_or("question", ""))
        .with_metadata("answer", text_or("answer", ""))
        .with_metadata("category", text_or("category", "unknown category"))
        .with_metadata("language", text_or("language", ""))
        .with_metadata("rank", rank + 1)
        .with_metadata("faq_id", faq.id.clone())
    }
}

#[async_trait]
impl RecallSource for FaqRecallSource {
    fn source_name(&self) -> &str {
        "faq"
    }

    async fn fetch(&self, request: &RecallRequest) -> Result<Vec<RecallHit>> {
        let embedding = request.embedding(self.embedder.as_ref()).await?;
        let results = self
            .repository
            .search(
                embedding,
                request.top_k(),
                self.score_threshold,
                request.language(),
            )
            .await?;

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(rank, faq)| self.to_hit(rank, faq))
            .collect())
    }
}
