//! LLM provider abstraction layer.
//!
//! This module defines the completion and embedding capabilities the engine
//! consumes, with one implementation per backend (Ollama, Mistral API,
//! OpenAI-compatible endpoints).

mod types;
pub mod mistral;
pub mod ollama;
pub mod openai;

// Re-export common types
pub use types::{
    ChatRequest,
    EmbedRequest,
    EmbedResponse,
    EmbeddingProvider,
    Message,
    Provider,
    ProviderError,
    Result,
    Role,
};

// Re-export provider implementations
pub use mistral::MistralProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatProvider;

use crate::config::{env_var, non_empty, EmbeddingConfig, LlmConfig, TimeoutConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds the completion provider selected in configuration.
///
/// Selection happens once here; callers only ever see `dyn Provider`.
pub fn from_config(config: &LlmConfig, timeouts: &TimeoutConfig) -> Result<Arc<dyn Provider>> {
    info!(provider = config.provider_name(), model = config.model(), "Initializing completion provider");

    let provider: Arc<dyn Provider> = match config {
        LlmConfig::Ollama { base_url, model, temperature } => Arc::new(OllamaProvider::new(
            base_url,
            model,
            *temperature,
            timeouts.completion(),
        )?),
        LlmConfig::MistralApi { base_url, model, api_key, temperature } => {
            let api_key = resolve_api_key(api_key, "MISTRAL_API_KEY")?;
            Arc::new(MistralProvider::new(
                base_url,
                model,
                api_key,
                *temperature,
                timeouts.completion(),
            )?)
        }
        LlmConfig::QwenApi { base_url, model, api_key, temperature, max_tokens } => {
            let api_key = resolve_api_key(api_key, "QWEN_API_KEY")?;
            Arc::new(
                OpenAiCompatProvider::new(
                    base_url,
                    model,
                    api_key,
                    *temperature,
                    timeouts.completion(),
                )?
                .with_max_tokens(*max_tokens),
            )
        }
    };

    Ok(provider)
}

/// Builds the embedding provider (an Ollama `/api/embed` endpoint).
pub fn embedding_from_config(
    config: &EmbeddingConfig,
    timeouts: &TimeoutConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    info!(model = %config.model, base_url = %config.base_url, "Initializing embedding provider");
    let provider = OllamaProvider::new(&config.base_url, &config.model, 0.0, timeouts.embedding())?;
    Ok(Arc::new(provider))
}

/// Runs a completion, failing with [`ProviderError::Timeout`] if it takes longer than `timeout`.
pub async fn complete_within(
    provider: &dyn Provider,
    request: ChatRequest,
    timeout: Duration,
) -> Result<String> {
    tokio::time::timeout(timeout, provider.complete(request))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))?
}

fn resolve_api_key(configured: &Option<String>, env_name: &str) -> Result<String> {
    non_empty(configured.clone())
        .or_else(|| env_var(env_name))
        .ok_or_else(|| ProviderError::Config(format!("missing API key (set it in config or {})", env_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_key_wins() {
        let key = resolve_api_key(&Some("sk-config".to_string()), "DOCENT_TEST_UNSET_KEY").unwrap();
        assert_eq!(key, "sk-config");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = resolve_api_key(&None, "DOCENT_TEST_UNSET_KEY");
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl Provider for Stalled {
        async fn complete(&self, _request: ChatRequest) -> Result<String> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_complete_within_times_out() {
        let result = complete_within(
            &Stalled,
            ChatRequest::new(vec![Message::user("halo")]),
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let provider = from_config(&LlmConfig::default(), &TimeoutConfig::default());
        assert!(provider.is_ok());
    }
}
