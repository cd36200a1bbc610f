use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Category assigned to chunks whose path is empty.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A retrievable unit of text plus its place in the content hierarchy.
///
/// The `content` already carries a `Path: a > b > c` breadcrumb, so the
/// embedding sees the hierarchy as well as the text.
///
/// # Example
///
/// ```
/// # use docent_core::rag::Chunk;
/// let path = vec!["Panduan".to_string(), "Login".to_string()];
/// let chunk = Chunk::from_path(&path, "Login", &["Buka halaman masuk.".to_string()]);
/// assert_eq!(chunk.metadata.category, "Panduan");
/// assert_eq!(chunk.metadata.subcategory.as_deref(), Some("Login"));
/// assert!(chunk.content.starts_with("Path: Panduan > Login"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Joined breadcrumb path (`a > b > c`).
    pub source: String,
    pub title: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Chunk {
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        let content = content.into();
        Self {
            id: content_id(&content),
            content,
            metadata,
        }
    }

    /// Builds a chunk from the path at the time of emission and the accumulated texts.
    pub fn from_path(path: &[String], title: &str, texts: &[String]) -> Self {
        let joined_path = path.join(" > ");
        let content = format!("Path: {}\n\n{}", joined_path, texts.join("\n"));
        let metadata = ChunkMetadata {
            source: joined_path,
            title: title.to_string(),
            category: category_of(path),
            subcategory: path.get(1).cloned(),
            topic: None,
        };
        Self::new(content, metadata)
    }
}

/// First path segment, or [`UNCATEGORIZED`] for an empty path.
pub fn category_of(path: &[String]) -> String {
    path.first()
        .cloned()
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}

/// Hex SHA-256 of the chunk content; equal content gives equal ids.
pub fn content_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A search result containing a chunk and its similarity score.
///
/// Returned by index queries, ordered by descending similarity score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Metadata field used as the topical grouping of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    Topic,
    Subcategory,
    Category,
}

impl ScopeLevel {
    /// The chunk's value at this level, if it has one.
    pub fn value_of<'a>(&self, metadata: &'a ChunkMetadata) -> Option<&'a str> {
        match self {
            ScopeLevel::Topic => metadata.topic.as_deref(),
            ScopeLevel::Subcategory => metadata.subcategory.as_deref(),
            ScopeLevel::Category => Some(metadata.category.as_str()),
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeLevel::Topic => "topic",
            ScopeLevel::Subcategory => "subcategory",
            ScopeLevel::Category => "category",
        };
        f.write_str(name)
    }
}

/// Chunks kept after scope-restricted re-expansion, in final order.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub scope_level: ScopeLevel,
    pub scope_value: String,
}
