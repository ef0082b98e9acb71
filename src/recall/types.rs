// src/recall/types.rs

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::embedding::EmbeddingProvider;
use crate::error::{RecallError, Result};

/// One user turn's recall input.
///
/// Clones share the query embedding: whichever source asks first computes it, the rest
/// reuse it. All vector-backed sources of one orchestrator must therefore use the same
/// embedding model.
#[derive(Debug, Clone)]
pub struct RecallRequest {
    query: String,
    top_k: usize,
    language: Option<String>,
    session_id: Option<String>,
    embedding: Arc<OnceCell<Vec<f32>>>,
}

impl RecallRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(RecallError::Validation("recall query is empty".into()));
        }
        if top_k == 0 {
            return Err(RecallError::Validation("top_k must be at least 1".into()));
        }

        Ok(Self {
            query,
            top_k,
            language: None,
            session_id: None,
            embedding: Arc::new(OnceCell::new()),
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Query embedding, computed on first use
    pub async fn embedding(&self, embedder: &dyn EmbeddingProvider) -> Result<&[f32]> {
        let vector = self
            .embedding
            .get_or_try_init(|| async { embedder.embed(&self.query).await })
            .await?;
        Ok(vector.as_slice())
    }
}

/// A single retrieved candidate with provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecallHit {
    pub source: String,
    pub score: f32,
    pub confidence: f32,
    pub reason: String,
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl RecallHit {
    /// Scores outside [0, 1] are clamped; confidence starts equal to the score.
    pub fn new(
        source: impl Into<String>,
        score: f32,
        reason: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            source: source.into(),
            score,
            confidence: score,
            reason: reason.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
