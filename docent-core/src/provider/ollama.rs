//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements both the
//! completion and the embedding capability.

use super::types::*;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f64,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider for the given server and model.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            http_client,
        })
    }
}

impl OllamaProvider {
    /// Ollama only accepts base64 image payloads, so remote images are
    /// downloaded and encoded here.
    async fn encode_images(&self, images: &[String]) -> Result<Vec<String>> {
        let mut encoded = Vec::with_capacity(images.len());
        for reference in images {
            if let Some(payload) = inline_payload(reference)? {
                encoded.push(payload);
                continue;
            }

            let response = self.http_client.get(reference).send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::Api(format!(
                    "Failed to fetch image {}: {}",
                    reference,
                    response.status()
                )));
            }
            let bytes = response.bytes().await?;
            debug!(url = %reference, bytes = bytes.len(), "Fetched image for Ollama");
            encoded.push(STANDARD.encode(&bytes));
        }
        Ok(encoded)
    }
}

/// The base64 payload of an image reference that needs no download:
/// a `data:` URL or an already encoded payload. `None` for http(s) URLs.
fn inline_payload(reference: &str) -> Result<Option<String>> {
    let reference = reference.trim();
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(None);
    }
    if let Some(data) = reference.strip_prefix("data:") {
        return match data.split_once(";base64,") {
            Some((_, payload)) => Ok(Some(payload.to_string())),
            None => Err(ProviderError::Config(
                "Image data URLs must be base64 encoded".to_string(),
            )),
        };
    }
    Ok(Some(reference.to_string()))
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(request.messages.len());
        for m in &request.messages {
            let images = match &m.images {
                Some(images) => Some(self.encode_images(images).await?),
                None => None,
            };
            messages.push(OllamaMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
                images,
            });
        }

        // Convert to Ollama-specific request format
        let ollama_request = OllamaChatRequest {
            model: self.model.clone(),
            messages,
            options: {
                let mut opts = HashMap::new();
                let temperature = request.temperature.unwrap_or(self.temperature);
                opts.insert("temperature".to_string(), serde_json::json!(temperature));
                if let Some(max_tokens) = request.max_tokens {
                    opts.insert("num_predict".to_string(), serde_json::json!(max_tokens));
                }
                Some(opts)
            },
            stream: true,
        };

        let response = self.http_client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        let mut content = String::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();
                append_stream_line(&line[..line.len() - 1], &mut content)?;
            }
        }

        // A final line without a trailing newline.
        if !buffer.is_empty() {
            append_stream_line(&buffer, &mut content)?;
        }

        debug!(model = %self.model, chars = content.len(), "Ollama completion finished");
        Ok(content)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let response = self.http_client
            .post(&url)
            .json(&embed_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let embed_response = response.json::<EmbedResponse>().await?;

        embed_response.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }
}

/// Parses one NDJSON line of a streamed chat response and appends its content.
fn append_stream_line(line: &[u8], content: &mut String) -> Result<()> {
    let line_str = String::from_utf8_lossy(line);
    let line_str = line_str.trim();
    if line_str.is_empty() {
        return Ok(());
    }

    let chunk: OllamaChatResponse = serde_json::from_str(line_str)?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::Api(error));
    }
    if let Some(message) = chunk.message {
        content.push_str(&message.content);
    }
    Ok(())
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_lines_accumulate() {
        let mut content = String::new();
        append_stream_line(
            br#"{"model":"m","message":{"role":"assistant","content":"Hal"},"done":false}"#,
            &mut content,
        )
        .unwrap();
        append_stream_line(
            br#"{"model":"m","message":{"role":"assistant","content":"o!"},"done":true}"#,
            &mut content,
        )
        .unwrap();
        append_stream_line(b"   ", &mut content).unwrap();
        assert_eq!(content, "Halo!");
    }

    #[test]
    fn test_stream_error_line() {
        let mut content = String::new();
        let result = append_stream_line(br#"{"error":"model not found"}"#, &mut content);
        assert!(matches!(result, Err(ProviderError::Api(msg)) if msg == "model not found"));
    }

    #[test]
    fn test_image_references() {
        assert_eq!(inline_payload("https://example.com/shot.png").unwrap(), None);
        assert_eq!(
            inline_payload("data:image/png;base64,iVBORw0KGgo=").unwrap().as_deref(),
            Some("iVBORw0KGgo=")
        );
        assert_eq!(inline_payload("iVBORw0KGgo=").unwrap().as_deref(), Some("iVBORw0KGgo="));
        assert!(matches!(
            inline_payload("data:text/plain,halo"),
            Err(ProviderError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_inline_images_skip_download() {
        let provider = OllamaProvider::new("http://127.0.0.1:9", "llava", 0.2, Duration::from_secs(1)).unwrap();
        let encoded = provider
            .encode_images(&["data:image/jpeg;base64,/9j/4AAQ".to_string()])
            .await
            .unwrap();
        assert_eq!(encoded, vec!["/9j/4AAQ".to_string()]);
        assert_eq!(STANDARD.encode(b"png"), "cG5n");
    }
}
