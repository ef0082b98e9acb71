// src/embedding/openai.rs
// OpenAI-compatible /v1/embeddings client

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::EmbeddingProvider;
use crate::config::Settings;
use crate::error::{RecallError, Result};

const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding client for OpenAI and API-compatible servers.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddings {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecallError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.embedding_base_url,
            &settings.embedding_api_key,
            &settings.embedding_model,
            settings.embedding_dim,
            settings.embedding_timeout(),
        )
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let mut body = json!({
            "model": self.model,
            "input": input,
        });
        // ada-002 rejects the dimensions parameter
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = json!(self.dimension);
        }

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "<no body>".into());
            return Err(RecallError::Embedding(format!(
                "embedding API error ({status}): {error_text}"
            )));
        }

        let result: EmbeddingResponse = response.json().await?;
        let embeddings: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(RecallError::Validation(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    embedding.len()
                )));
            }
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RecallError::Validation("cannot embed empty text".into()));
        }

        debug!(chars = text.len(), model = %self.model, "Requesting embedding");
        let mut embeddings = self.request(json!(text)).await?;
        if embeddings.is_empty() {
            return Err(RecallError::Embedding("no embedding data in API response".into()));
        }
        Ok(embeddings.swap_remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > MAX_BATCH_SIZE {
            return Err(RecallError::Validation(format!(
                "batch size {} exceeds maximum of {}",
                texts.len(),
                MAX_BATCH_SIZE
            )));
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(RecallError::Validation("cannot embed empty text".into()));
        }

        debug!(count = texts.len(), model = %self.model, "Requesting embedding batch");
        let embeddings = self.request(json!(texts)).await?;
        if embeddings.len() != texts.len() {
            return Err(RecallError::Embedding(format!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
