// src/recall/orchestrator.rs
// Concurrent fan-out to all recall sources, then score-ordered fusion

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::source::RecallSource;
use super::types::{RecallHit, RecallRequest};

/// Source tasks still running when a recall is dropped are aborted with it.
struct SourceTasks(Vec<JoinHandle<Vec<RecallHit>>>);

impl Drop for SourceTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Fans a request out to every registered source and merges the hits.
///
/// Ordering of the fused list: score descending, then source registration order, then
/// the source's own rank. A source that fails or panics contributes nothing; there are no
/// retries within a request.
#[derive(Default)]
pub struct RecallOrchestrator {
    sources: Vec<Arc<dyn RecallSource>>,
    max_hits: Option<usize>,
}

impl RecallOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; earlier sources win score ties
    pub fn with_source(mut self, source: Arc<dyn RecallSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn register(&mut self, source: Arc<dyn RecallSource>) {
        self.sources.push(source);
    }

    /// Cap the fused list length
    pub fn with_max_hits(mut self, max_hits: usize) -> Self {
        self.max_hits = Some(max_hits);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source_name()).collect()
    }

    pub async fn recall(&self, request: &RecallRequest) -> Vec<RecallHit> {
        let start = Instant::now();

        // Each source runs in its own task so a panic stays inside that task
        let mut tasks = SourceTasks(
            self.sources
                .iter()
                .map(|source| {
                    let source = Arc::clone(source);
                    let request = request.clone();
                    tokio::spawn(async move { source.acquire(&request).await })
                })
                .collect(),
        );

        let outcomes = join_all(tasks.0.iter_mut()).await;

        let mut ranked: Vec<(usize, usize, RecallHit)> = Vec::new();
        for (priority, (source, outcome)) in self.sources.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(hits) => {
                    debug!(source = source.source_name(), hits = hits.len(), "Collected source hits");
                    ranked.extend(
                        hits.into_iter()
                            .enumerate()
                            .map(|(rank, hit)| (priority, rank, hit)),
                    );
                }
                Err(e) => {
                    error!(source = source.source_name(), error = %e, "Recall source task aborted");
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.2.score
                .total_cmp(&a.2.score)
                .then(a.0.cmp(&b.0))
                .then(a.1.cmp(&b.1))
        });

        let mut fused: Vec<RecallHit> = ranked.into_iter().map(|(_, _, hit)| hit).collect();
        if let Some(max_hits) = self.max_hits {
            fused.truncate(max_hits);
        }

        info!(
            sources = self.sources.len(),
            hits = fused.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recall completed"
        );
        fused
    }
}
