//! The engine's outward surface: `answer`, `reset`, `sync`.

use crate::chat::{Answer, AnswerRequest, DialogueManager};
use crate::config::Config;
use crate::ingest::{ContentSource, IngestError, NotionSource};
use crate::provider::{self, EmbeddingProvider, Provider, ProviderError};
use crate::rag::{Embedder, IndexGateway, Retriever};
use crate::sync::{SyncReport, Syncer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Content source error: {0}")]
    Source(#[from] IngestError),
}

/// Conversational retrieval engine.
///
/// # Examples
///
/// ```no_run
/// use docent_core::{AnswerRequest, Config, Engine};
///
/// # async fn example() -> Result<(), docent_core::EngineError> {
/// let engine = Engine::from_config(Config::load_or_default())?;
///
/// let answer = engine.answer(AnswerRequest::new("Bagaimana cara login?", "user-1")).await?;
/// println!("{}", answer.text);
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    config: Config,
    dialogue: DialogueManager,
    syncer: Syncer,
    gateway: Arc<IndexGateway>,
}

impl Engine {
    /// Wires the configured completion, embedding and content services.
    ///
    /// A missing content-source token is not an error here; `sync` reports it.
    pub fn from_config(config: Config) -> Result<Self, EngineError> {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> &IndexGateway {
        &self.gateway
    }

    pub async fn answer(&self, request: AnswerRequest) -> Result<Answer, EngineError> {
        self.dialogue.answer(request).await
    }

    pub fn reset(&self, session_id: &str) {
        self.dialogue.reset(session_id)
    }

    pub async fn sync(&self) -> SyncReport {
        self.syncer.sync().await
    }

    pub fn dialogue(&self) -> &DialogueManager {
        &self.dialogue
    }
}

/// Builds an [`Engine`], with any service replaceable.
pub struct EngineBuilder {
    config: Config,
    provider: Option<Arc<dyn Provider>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    source: Option<Arc<dyn ContentSource>>,
    root_id: Option<String>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            provider: None,
            embedding: None,
            source: None,
            root_id: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn embedding_provider(mut self, embedding: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Overrides the configured root id.
    pub fn root_id(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let config = self.config;
        let timeouts = &config.timeouts;

        let provider = match self.provider {
            Some(provider) => provider,
            None => provider::from_config(&config.llm, timeouts)?,
        };
        let embedding = match self.embedding {
            Some(embedding) => embedding,
            None => provider::embedding_from_config(&config.embedding, timeouts)?,
        };
        let source: Option<Arc<dyn ContentSource>> = match self.source {
            Some(source) => Some(source),
            None => match NotionSource::new(&config.source, timeouts.source()) {
                Ok(notion) => Some(Arc::new(notion)),
                Err(IngestError::Config(reason)) => {
                    warn!(reason = %reason, "Content source unavailable; sync disabled");
                    None
                }
                Err(e) => return Err(e.into()),
            },
        };
        let root_id = self.root_id.or_else(|| config.source.resolved_root_id());

        let embedder = Embedder::new(embedding, timeouts.embedding());
        let gateway = Arc::new(
            IndexGateway::new(&config.storage.index_path, embedder, &config.embedding.model)
                .with_concurrency(config.embedding.concurrency),
        );

        let retriever = Retriever::new(Arc::clone(&gateway), &config.retrieval);
        let dialogue = DialogueManager::new(provider, retriever, &config);
        let syncer = Syncer::new(source, root_id, Arc::clone(&gateway), timeouts.source());

        info!(
            provider = config.llm.provider_name(),
            model = config.llm.model(),
            index = %config.storage.index_path.display(),
            "Engine ready"
        );

        Ok(Engine {
            config,
            dialogue,
            syncer,
            gateway,
        })
    }
}
