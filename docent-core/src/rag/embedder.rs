//! Embedding generation through an embedding provider.
//!
//! This module converts text into vector embeddings, bounding every call
//! with the configured embedding timeout.

use crate::provider::{EmbeddingProvider, ProviderError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider did not answer within the timeout.
    #[error("Embedding timed out after {0:?}")]
    Timeout(Duration),

    /// The API response contained no values.
    #[error("No embeddings returned")]
    NoEmbeddings,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text.
///
/// Similar texts get similar vectors, as measured by cosine similarity.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The embedding service is unreachable or rejects the request
    /// - The call exceeds the timeout
    /// - The service returns an empty vector
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = tokio::time::timeout(self.timeout, self.provider.embed(text))
            .await
            .map_err(|_| EmbedderError::Timeout(self.timeout))??;

        if embedding.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }
        Ok(embedding)
    }
}
