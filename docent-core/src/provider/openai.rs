//! OpenAI-compatible chat completions provider.
//!
//! Used for hosted models reachable through an OpenAI-style endpoint
//! (the `qwen_api` provider talks to OpenRouter this way).

use super::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Provider for any `/chat/completions` endpoint that speaks the OpenAI wire format.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
    max_tokens: Option<u32>,
    http_client: reqwest::Client,
}

impl OpenAiCompatProvider {
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
            max_tokens: None,
            http_client,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn encode_message(message: &Message) -> Value {
        let images = message.image_urls();
        if images.is_empty() {
            return json!({ "role": message.role.as_str(), "content": message.content });
        }

        let mut parts = vec![json!({ "type": "text", "text": message.content })];
        parts.extend(
            images
                .iter()
                .map(|url| json!({ "type": "image_url", "image_url": { "url": url } })),
        );
        json!({ "role": message.role.as_str(), "content": parts })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = CompletionRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(Self::encode_message).collect(),
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.or(self.max_tokens),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let content = read_completion(response).await?;
        debug!(model = %self.model, chars = content.len(), "Completion finished");
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Value>,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    pub(super) fn into_text(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Other("No completion choices returned".to_string()))
    }
}

/// Checks the status of a `/chat/completions` response and extracts the reply text.
pub(super) async fn read_completion(response: reqwest::Response) -> Result<String> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        return Err(ProviderError::Api(format!("{}: {}", status, error_text)));
    }

    let body = response.text().await?;
    let parsed: CompletionResponse = serde_json::from_str(&body)?;
    parsed.into_text()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_is_plain_string() {
        let encoded = OpenAiCompatProvider::encode_message(&Message::user("Halo"));
        assert_eq!(encoded, json!({ "role": "user", "content": "Halo" }));
    }

    #[test]
    fn test_image_message_uses_content_parts() {
        let encoded = OpenAiCompatProvider::encode_message(&Message::user_with_image(
            "Apa ini?",
            "https://example.com/a.png",
        ));
        assert_eq!(encoded["content"][0]["text"], "Apa ini?");
        assert_eq!(encoded["content"][1]["image_url"]["url"], "https://example.com/a.png");
    }

    #[test]
    fn test_completion_response_text() {
        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Jawaban"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.into_text().unwrap(), "Jawaban");

        let empty: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.into_text().is_err());
    }
}
