// src/recall/source.rs

use async_trait::async_trait;
use std::time::Instant;
use tracing::{error, info};

use super::types::{RecallHit, RecallRequest};
use crate::error::Result;

/// One retrieval mechanism feeding the orchestrator.
#[async_trait]
pub trait RecallSource: Send + Sync {
    /// Constant identity, copied into every hit's `source`
    fn source_name(&self) -> &str;

    /// Retrieve hits, propagating any failure
    async fn fetch(&self, request: &RecallRequest) -> Result<Vec<RecallHit>>;

    /// Retrieve hits; failures are logged and yield an empty list.
    async fn acquire(&self, request: &RecallRequest) -> Vec<RecallHit> {
        let start = Instant::now();
        match self.fetch(request).await {
            Ok(hits) if hits.is_empty() => {
                info!(source = self.source_name(), query = request.query(), "No recall results");
                hits
            }
            Ok(hits) => {
                info!(
                    source = self.source_name(),
                    hits = hits.len(),
                    top_score = hits[0].score,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Recall source finished"
                );
                hits
            }
            Err(e) => {
                error!(
                    source = self.source_name(),
                    query = request.query(),
                    error = %e,
                    "Recall source failed"
                );
                Vec::new()
            }
        }
    }
}
