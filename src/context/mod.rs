// Long-lived clients shared by the CLI and the HTTP server


use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::ChatService;
use crate::config::{Config, VectorBackend};
use crate::database::{CollectionStats, LanceDbStore, MemoryStore, QdrantStore, VectorStore};
use crate::embeddings::{Embedder, OllamaEmbedder};
use crate::indexer::Indexer;
use crate::llm::{AnswerSynthesizer, ChatBackend, GenerationOptions, OllamaChat};
use crate::retrieval::ContextBuilder;
use crate::{RagError, Result};

/// Store, embedder and chat backend, built once at startup
pub struct RagContext {
    config: Config,
    store: Arc<dyn VectorStore>,
    embedder: Option<Arc<dyn Embedder>>,
    chat: Arc<dyn ChatBackend>,
}

impl RagContext {
    /// Connect the configured backends. Nothing is contacted until first use.
    #[inline]
    pub async fn init(config: Config) -> Result<Self> {
        let store: Arc<dyn VectorStore> = match config.vector_store.backend {
            VectorBackend::Qdrant => Arc::new(
                QdrantStore::new(&config.vector_store.url)
                    .map_err(|e| RagError::Configuration(format!("{:#}", e)))?,
            ),
            VectorBackend::Lancedb => {
                Arc::new(LanceDbStore::new(&config.vector_database_path()).await?)
            }
            VectorBackend::Memory => {
                warn!("Using the in-memory vector store; indexed data is lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        let embedder: Option<Arc<dyn Embedder>> = if config.embedding.enabled {
            Some(Arc::new(OllamaEmbedder::new(&config.embedding)?))
        } else {
            warn!("Embeddings disabled, retrieval runs in keyword mode");
            None
        };

        let chat: Arc<dyn ChatBackend> = Arc::new(OllamaChat::new(&config.llm)?);

        info!(
            "Context ready: {} store, collection {}, chat model {}",
            store.backend_name(),
            config.vector_store.collection,
            chat.model_name()
        );

        Ok(Self::from_parts(config, store, embedder, chat))
    }

    /// Assemble a context from already constructed collaborators
    #[inline]
    pub fn from_parts(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Option<Arc<dyn Embedder>>,
        chat: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            chat,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    #[inline]
    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    #[inline]
    pub fn chat(&self) -> &Arc<dyn ChatBackend> {
        &self.chat
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.config.vector_store.collection
    }

    #[inline]
    pub fn context_builder(&self) -> ContextBuilder {
        ContextBuilder::new(
            Arc::clone(&self.store),
            self.embedder.clone(),
            self.collection(),
            self.config.retrieval.clone(),
        )
        .with_search_limit(self.config.vector_store.search_limit)
        .with_min_score(self.config.vector_store.min_score)
    }

    #[inline]
    pub fn synthesizer(&self) -> AnswerSynthesizer {
        AnswerSynthesizer::new(Arc::clone(&self.chat))
            .with_system_prompt(self.config.llm.system_prompt.as_str())
            .with_options(GenerationOptions {
                temperature: self.config.llm.temperature,
                max_tokens: self.config.llm.max_tokens,
            })
    }

    #[inline]
    pub fn chat_service(&self) -> ChatService {
        ChatService::new(self.context_builder(), self.synthesizer())
    }

    /// Indexing needs real embeddings; keyword mode cannot index
    #[inline]
    pub fn indexer(&self) -> Result<Indexer> {
        let embedder = self.embedder.clone().ok_or_else(|| {
            RagError::Configuration(
                "Embeddings are disabled; enable [embedding] to index documents".to_string(),
            )
        })?;

        Ok(Indexer::new(
            Arc::clone(&self.store),
            embedder,
            self.collection(),
            self.config.chunking.clone(),
            self.config.indexing.id_policy,
        ))
    }

    /// Collection statistics, tagged with the configured embedding model
    #[inline]
    pub async fn stats(&self) -> Result<CollectionStats> {
        let mut stats = self.store.stats(self.collection()).await?;
        stats.embedding_model = self
            .embedder
            .as_ref()
            .map(|embedder| embedder.model_name().to_string());
        Ok(stats)
    }
}
