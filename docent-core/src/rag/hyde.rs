//! Hypothetical document expansion (HyDE).
//!
//! An answer-shaped embedding matches answer-shaped chunks better than a
//! question-shaped one, so retrieval runs on a synthetic ideal answer
//! instead of the raw question.

use crate::prompts;
use crate::provider::{self, ChatRequest, Message, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct Hyde {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

impl Hyde {
    pub fn new(provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Writes the ideal answer paragraph for `question`.
    ///
    /// Completion failures propagate; there is no fallback to the raw question.
    pub async fn expand(&self, question: &str) -> provider::Result<String> {
        let request = ChatRequest::new(vec![Message::user(prompts::hyde_prompt(question))]);
        let document = provider::complete_within(self.provider.as_ref(), request, self.timeout).await?;

        let preview: String = document.chars().take(100).collect();
        debug!(preview = %preview, "Hypothetical document generated");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        async fn complete(&self, request: ChatRequest) -> provider::Result<String> {
            Ok(format!("HYDE::{}", request.messages[0].content))
        }
    }

    struct Down;

    #[async_trait]
    impl Provider for Down {
        async fn complete(&self, _request: ChatRequest) -> provider::Result<String> {
            Err(ProviderError::Api("unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_expand_wraps_question_in_prompt() {
        let hyde = Hyde::new(Arc::new(Echo), Duration::from_secs(5));
        let document = hyde.expand("Bagaimana cara login?").await.unwrap();
        assert!(document.starts_with("HYDE::Tulis paragraf jawaban ideal"));
        assert!(document.contains("Pertanyaan: Bagaimana cara login?"));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let hyde = Hyde::new(Arc::new(Down), Duration::from_secs(5));
        assert!(matches!(hyde.expand("x").await, Err(ProviderError::Api(_))));
    }
}
