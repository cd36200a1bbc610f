//! Notion REST API content source.

use super::{Block, BlockType, ContentSource, IngestError, NodeKind, PageInfo, Result};
use crate::config::SourceConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const PAGE_SIZE: u32 = 100;

/// Reads pages, databases and blocks from a Notion workspace.
#[derive(Debug, Clone)]
pub struct NotionSource {
    base_url: String,
    http_client: reqwest::Client,
}

/// One page of a cursor-paginated list response.
#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl NotionSource {
    /// Creates a client authenticated with the configured integration token.
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self> {
        let token = config
            .resolved_token()
            .ok_or_else(|| IngestError::Config("missing Notion token (set source.token or NOTION_API_KEY)".into()))?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| IngestError::Config(format!("invalid token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        let version = HeaderValue::from_str(&config.api_version)
            .map_err(|e| IngestError::Config(format!("invalid API version: {}", e)))?;
        headers.insert("Notion-Version", version);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn read(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(IngestError::Api { status: status.as_u16(), message });
        }

        Ok(response.json::<Value>().await?)
    }

    /// Follows `next_cursor` until `has_more` is false.
    async fn collect_paginated<F>(&self, mut request_for: F) -> Result<Vec<Value>>
    where
        F: FnMut(Option<&str>) -> reqwest::RequestBuilder + Send,
    {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let value = self.read(request_for(cursor.as_deref())).await?;
            let page: ListPage = serde_json::from_value(value)?;
            results.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl ContentSource for NotionSource {
    async fn kind(&self, id: &str) -> Result<NodeKind> {
        let url = format!("{}/blocks/{}", self.base_url, id);
        let block = self.read(self.http_client.get(&url)).await?;
        Ok(kind_of(&block))
    }

    async fn collection_pages(&self, id: &str) -> Result<Vec<String>> {
        let url = format!("{}/databases/{}/query", self.base_url, id);
        let results = self
            .collect_paginated(|cursor| {
                let mut body = json!({ "page_size": PAGE_SIZE });
                if let Some(cursor) = cursor {
                    body["start_cursor"] = json!(cursor);
                }
                self.http_client.post(&url).json(&body)
            })
            .await?;

        let ids: Vec<String> = results.iter().filter_map(|page| str_field(page, "id")).collect();
        debug!(database = id, pages = ids.len(), "Queried database");
        Ok(ids)
    }

    async fn page(&self, id: &str) -> Result<PageInfo> {
        let url = format!("{}/pages/{}", self.base_url, id);
        let page = self.read(self.http_client.get(&url)).await?;
        Ok(parse_page(&page))
    }

    async fn children(&self, id: &str) -> Result<Vec<Block>> {
        let url = format!("{}/blocks/{}/children", self.base_url, id);
        let results = self
            .collect_paginated(|cursor| {
                let mut query = vec![("page_size", PAGE_SIZE.to_string())];
                if let Some(cursor) = cursor {
                    query.push(("start_cursor", cursor.to_string()));
                }
                self.http_client.get(&url).query(&query)
            })
            .await?;

        results.iter().map(parse_block).collect()
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn kind_of(block: &Value) -> NodeKind {
    match block.get("type").and_then(Value::as_str) {
        Some("child_database") => NodeKind::Collection,
        Some("child_page") => NodeKind::Page,
        _ => NodeKind::Block,
    }
}

/// Concatenated `plain_text` of a rich text array.
fn plain_text(rich_text: Option<&Value>) -> String {
    rich_text
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_block(value: &Value) -> Result<Block> {
    let id = str_field(value, "id").ok_or_else(|| IngestError::Malformed {
        id: "<unknown>".into(),
        reason: "block without id".into(),
    })?;
    let type_name = str_field(value, "type").ok_or_else(|| IngestError::Malformed {
        id: id.clone(),
        reason: "block without type".into(),
    })?;

    let block_type = BlockType::from_name(&type_name);
    let text = if block_type.carries_text() {
        plain_text(value.get(&type_name).and_then(|body| body.get("rich_text")))
    } else {
        String::new()
    };

    Ok(Block {
        id,
        block_type,
        text,
        has_children: value.get("has_children").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// The first title property and all relation targets, in property order.
fn parse_page(page: &Value) -> PageInfo {
    let Some(properties) = page.get("properties").and_then(Value::as_object) else {
        return PageInfo::default();
    };

    let title = properties
        .values()
        .find(|prop| prop.get("type").and_then(Value::as_str) == Some("title"))
        .map(|prop| plain_text(prop.get("title")));

    let relations = properties
        .values()
        .filter(|prop| prop.get("type").and_then(Value::as_str) == Some("relation"))
        .filter_map(|prop| prop.get("relation").and_then(Value::as_array))
        .flatten()
        .filter_map(|link| str_field(link, "id"))
        .collect();

    PageInfo { title, relations }
}
