// src/embedding/mod.rs

//! Text embedding providers.

mod openai;

pub use openai::OpenAiEmbeddings;

use async_trait::async_trait;

use crate::error::Result;

/// Converts text into fixed-dimension vectors for the active collection schemas.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Default implementation embeds one text at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize;
}
