//! docent-core - Conversational retrieval over a hierarchical knowledge base
//!
//! Provides the components behind a documentation assistant:
//! - Content ingestion from a page/database tree (Notion)
//! - Embedding index with atomic rebuilds
//! - Scope-inferring two-phase retrieval with HyDE query expansion
//! - Session-aware dialogue with intent routing
//! - LLM provider abstraction (Ollama, Mistral API, OpenAI-compatible)
//!
//! ## Primary API
//!
//! Callers interact with the [`Engine`]: `answer`, `reset` and `sync`.

// Public modules
pub mod chat;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod prompts;
pub mod provider;
pub mod rag;
pub mod sync;

// Public exports
pub use chat::{Answer, AnswerRequest, DialogueManager, HistoryMessage, HistoryRole, Intent, SessionStore, Turn};
pub use config::Config;
pub use engine::{Engine, EngineBuilder, EngineError};
pub use ingest::{ContentSource, MemorySource, NotionSource};
pub use sync::{SyncReport, SyncStatus, Syncer};

// Provider exports
pub use provider::{ChatRequest, EmbeddingProvider, Message, Provider, ProviderError, Role};
