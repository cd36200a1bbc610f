//! Retrieval Augmented Generation (RAG) system.
//!
//! # Architecture
//!
//! - [`Embedder`]: converts text to vectors through an embedding provider
//! - [`FlatIndex`]: exact cosine-similarity index over embedded chunks
//! - [`IndexGateway`]: persisted index artifact (load, atomic save, build, query)
//! - [`Retriever`]: two-phase search with scope inference, builds prompt context
//! - [`Hyde`]: hypothetical-document query expansion
//!
//! # How It Works
//!
//! 1. **Indexing** (batch, see [`crate::sync`]):
//!    - Ingested chunks are embedded in document order
//!    - The built index replaces the persisted artifact atomically
//!
//! 2. **Retrieval**:
//!    - The question is expanded into a hypothetical answer
//!    - The index returns `k_neighbors` candidates for that answer
//!    - The dominant topic / subcategory / category among them is inferred
//!    - A second search on the scope label is filtered to that scope
//!
//! 3. **Generation** (handled by the dialogue manager):
//!    - Context is placed in the prompt together with recent history

mod embedder;
mod gateway;
mod hyde;
mod retriever;
mod store;
mod types;

pub use embedder::{Embedder, EmbedderError};
pub use gateway::IndexGateway;
pub use hyde::Hyde;
pub use retriever::{format_context, infer_scope, Retriever, CONTEXT_SEPARATOR};
pub use store::{FlatIndex, IndexEntry};
pub use types::{
    category_of, content_id, Chunk, ChunkMetadata, RetrievalResult, ScopeLevel, SearchResult,
    UNCATEGORIZED,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
