//! Mistral API provider.

use super::openai::{read_completion, CompletionRequest};
use super::types::*;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Hosted Mistral chat completions (`api.mistral.ai`).
#[derive(Debug, Clone)]
pub struct MistralProvider {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
    http_client: reqwest::Client,
}

impl MistralProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature,
            http_client,
        })
    }

    /// Mistral takes the image URL directly as the `image_url` value.
    fn encode_message(message: &Message) -> Value {
        let images = message.image_urls();
        if images.is_empty() {
            return json!({ "role": message.role.as_str(), "content": message.content });
        }

        let mut parts = vec![json!({ "type": "text", "text": message.content })];
        parts.extend(
            images
                .iter()
                .map(|url| json!({ "type": "image_url", "image_url": url })),
        );
        json!({ "role": message.role.as_str(), "content": parts })
    }
}

#[async_trait]
impl Provider for MistralProvider {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = CompletionRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(Self::encode_message).collect(),
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let content = read_completion(response).await?;
        debug!(model = %self.model, chars = content.len(), "Mistral completion finished");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_is_a_plain_string() {
        let encoded = MistralProvider::encode_message(&Message::user_with_image(
            "Jelaskan gambar ini",
            "https://example.com/b.jpg",
        ));
        assert_eq!(encoded["role"], "user");
        assert_eq!(encoded["content"][1]["image_url"], "https://example.com/b.jpg");
    }
}
