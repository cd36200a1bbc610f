//! Hierarchical content ingestion.
//!
//! Walks a tree-shaped content source (pages, databases, nested blocks) and
//! turns it into hierarchy-tagged [`Chunk`]s.
//!
//! - [`ContentSource`]: what the walker needs from a backend
//! - [`NotionSource`]: the Notion REST API
//! - [`MemorySource`]: an in-memory tree, loadable from a JSON snapshot
//! - [`walk`]: the depth-first traversal
//! - [`dedupe`]: global deduplication by exact content

mod memory;
mod notion;
mod walker;

pub use memory::{MemoryNode, MemorySource};
pub use notion::NotionSource;
pub use walker::{walk, IngestReport};

use crate::rag::Chunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading the content source.
///
/// The walker never propagates these; a failing node is skipped.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed node {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error("Unknown node: {0}")]
    NotFound(String),

    #[error("Source configuration error: {0}")]
    Config(String),

    #[error("Source call timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// How a node must be walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A paginated collection of pages (a database). Adds no path segment.
    Collection,
    /// A titled item with properties and child blocks.
    Page,
    /// A plain block whose nested children are walked without a title lookup.
    Block,
}

/// Title and outgoing relation links of a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageInfo {
    pub title: Option<String>,
    pub relations: Vec<String>,
}

/// Block types the walker distinguishes. Unknown names map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum BlockType {
    Heading1,
    Heading2,
    Heading3,
    Paragraph,
    BulletedListItem,
    NumberedListItem,
    Toggle,
    Quote,
    Callout,
    ChildPage,
    ChildDatabase,
    Other,
}

impl From<String> for BlockType {
    fn from(name: String) -> Self {
        BlockType::from_name(&name)
    }
}

impl From<BlockType> for &'static str {
    fn from(block_type: BlockType) -> Self {
        block_type.name()
    }
}

impl BlockType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "heading_1" => BlockType::Heading1,
            "heading_2" => BlockType::Heading2,
            "heading_3" => BlockType::Heading3,
            "paragraph" => BlockType::Paragraph,
            "bulleted_list_item" => BlockType::BulletedListItem,
            "numbered_list_item" => BlockType::NumberedListItem,
            "toggle" => BlockType::Toggle,
            "quote" => BlockType::Quote,
            "callout" => BlockType::Callout,
            "child_page" => BlockType::ChildPage,
            "child_database" => BlockType::ChildDatabase,
            _ => BlockType::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlockType::Heading1 => "heading_1",
            BlockType::Heading2 => "heading_2",
            BlockType::Heading3 => "heading_3",
            BlockType::Paragraph => "paragraph",
            BlockType::BulletedListItem => "bulleted_list_item",
            BlockType::NumberedListItem => "numbered_list_item",
            BlockType::Toggle => "toggle",
            BlockType::Quote => "quote",
            BlockType::Callout => "callout",
            BlockType::ChildPage => "child_page",
            BlockType::ChildDatabase => "child_database",
            BlockType::Other => "other",
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, BlockType::Heading1 | BlockType::Heading2 | BlockType::Heading3)
    }

    /// Child pages and child databases are walked as nodes of their own.
    pub fn is_container(&self) -> bool {
        matches!(self, BlockType::ChildPage | BlockType::ChildDatabase)
    }

    pub fn carries_text(&self) -> bool {
        !matches!(self, BlockType::ChildPage | BlockType::ChildDatabase | BlockType::Other)
    }
}

/// A direct child block of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub has_children: bool,
}

impl Block {
    pub fn new(id: impl Into<String>, block_type: BlockType, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type,
            text: text.into(),
            has_children: false,
        }
    }

    pub fn with_children(mut self) -> Self {
        self.has_children = true;
        self
    }

    /// Trimmed text, or empty if the block type carries none.
    pub fn text_content(&self) -> &str {
        if self.block_type.carries_text() {
            self.text.trim()
        } else {
            ""
        }
    }
}

/// What the walker needs from a tree-shaped content backend.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Classifies a node before it is walked.
    async fn kind(&self, id: &str) -> Result<NodeKind>;

    /// All pages of a collection, following pagination to the end.
    async fn collection_pages(&self, id: &str) -> Result<Vec<String>>;

    /// Title and relation links of a page.
    async fn page(&self, id: &str) -> Result<PageInfo>;

    /// Direct child blocks of a node, in order.
    async fn children(&self, id: &str) -> Result<Vec<Block>>;
}

/// Keeps the first chunk of every distinct content, preserving order.
pub fn dedupe(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.content.clone()))
        .collect()
}
