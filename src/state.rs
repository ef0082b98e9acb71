// src/state.rs
// Wiring of engine, embeddings, repositories and recall sources from settings

use std::sync::Arc;
use tracing::info;

use crate::{
    config::Settings,
    embedding::{EmbeddingProvider, OpenAiEmbeddings},
    engine::{MilvusClient, VectorEngine},
    error::Result,
    recall::{FaqRecallSource, HistoryRecallSource, RecallOrchestrator, VectorRecallSource},
    repository::{FaqRepository, HistoryRepository, KnowledgeRepository, RepositoryOptions},
    schema::{FaqSchema, HistorySchema, KnowledgeSchema},
};

#[derive(Clone)]
pub struct RecallState {
    // -------- Storage --------
    pub engine: Arc<dyn VectorEngine>,
    pub knowledge: Arc<KnowledgeRepository>,
    pub faq: Arc<FaqRepository>,
    pub history: Arc<HistoryRepository>,

    // -------- Recall --------
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub orchestrator: Arc<RecallOrchestrator>,
}

impl RecallState {
    /// Build everything against the Milvus REST API and an OpenAI-compatible embedder
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let engine: Arc<dyn VectorEngine> = Arc::new(MilvusClient::from_settings(settings)?);
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAiEmbeddings::from_settings(settings)?);
        Ok(Self::with_components(settings, engine, embedder))
    }

    /// Build from explicit components; all three collections share one engine.
    ///
    /// Sources are registered knowledge first, then FAQ, then history, which is also
    /// their tie-break priority.
    pub fn with_components(
        settings: &Settings,
        engine: Arc<dyn VectorEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let options = RepositoryOptions::from_settings(settings);
        let dim = settings.embedding_dim;

        let knowledge = Arc::new(KnowledgeRepository::new(
            engine.clone(),
            KnowledgeSchema::new(&settings.milvus_knowledge_collection, dim),
            options.clone(),
        ));
        let faq = Arc::new(FaqRepository::new(
            engine.clone(),
            FaqSchema::new(&settings.milvus_faq_collection, dim),
            options.clone(),
        ));
        let history = Arc::new(HistoryRepository::new(
            engine.clone(),
            HistorySchema::new(&settings.milvus_history_collection, dim),
            options,
        ));

        let orchestrator = RecallOrchestrator::new()
            .with_source(Arc::new(VectorRecallSource::new(
                knowledge.clone(),
                embedder.clone(),
            )))
            .with_source(Arc::new(FaqRecallSource::new(faq.clone(), embedder.clone())))
            .with_source(Arc::new(HistoryRecallSource::new(
                history.clone(),
                embedder.clone(),
            )));

        info!(sources = ?orchestrator.source_names(), "Recall state ready");

        Self {
            engine,
            knowledge,
            faq,
            history,
            embedder,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Create or load every collection
    pub async fn initialize_collections(&self) -> Result<()> {
        self.knowledge.initialize().await?;
        self.faq.initialize().await?;
        self.history.initialize().await?;
        Ok(())
    }

    /// Health of each collection, in registration order
    pub async fn health(&self) -> Vec<(&'static str, bool)> {
        let (knowledge, faq, history) = tokio::join!(
            self.knowledge.health_check(),
            self.faq.health_check(),
            self.history.health_check()
        );
        vec![("knowledge", knowledge), ("faq", faq), ("history", history)]
    }
}
