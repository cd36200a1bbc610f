//! In-memory content tree.
//!
//! Mirrors the node model of the remote source so a workspace can be synced
//! offline from a JSON snapshot:
//!
//! ```json
//! {
//!   "root": {"kind": "page", "title": "Panduan", "children": [
//!     {"id": "b1", "type": "heading_1", "text": "Login"},
//!     {"id": "db", "type": "child_database"}
//!   ]},
//!   "db": {"kind": "collection", "pages": ["p1"]},
//!   "p1": {"kind": "page", "title": "Akun", "relations": ["root"]}
//! }
//! ```

use super::{Block, ContentSource, IngestError, NodeKind, PageInfo, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryNode {
    Collection {
        #[serde(default)]
        pages: Vec<String>,
    },
    Page {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        relations: Vec<String>,
        #[serde(default)]
        children: Vec<Block>,
    },
    Block {
        #[serde(default)]
        children: Vec<Block>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    nodes: HashMap<String, MemoryNode>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, id: impl Into<String>, node: MemoryNode) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn collection(self, id: &str, pages: Vec<&str>) -> Self {
        let pages = pages.into_iter().map(str::to_string).collect();
        self.insert(id, MemoryNode::Collection { pages })
    }

    pub fn page(self, id: &str, title: Option<&str>, relations: Vec<&str>, children: Vec<Block>) -> Self {
        self.insert(
            id,
            MemoryNode::Page {
                title: title.map(str::to_string),
                relations: relations.into_iter().map(str::to_string).collect(),
                children,
            },
        )
    }

    pub fn block(self, id: &str, children: Vec<Block>) -> Self {
        self.insert(id, MemoryNode::Block { children })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let nodes: HashMap<String, MemoryNode> = serde_json::from_str(json)?;
        Ok(Self { nodes })
    }

    /// Reads a JSON snapshot file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: &str) -> Result<&MemoryNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| IngestError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn kind(&self, id: &str) -> Result<NodeKind> {
        Ok(match self.node(id)? {
            MemoryNode::Collection { .. } => NodeKind::Collection,
            MemoryNode::Page { .. } => NodeKind::Page,
            MemoryNode::Block { .. } => NodeKind::Block,
        })
    }

    async fn collection_pages(&self, id: &str) -> Result<Vec<String>> {
        match self.node(id)? {
            MemoryNode::Collection { pages } => Ok(pages.clone()),
            _ => Err(IngestError::Malformed {
                id: id.to_string(),
                reason: "not a collection".into(),
            }),
        }
    }

    async fn page(&self, id: &str) -> Result<PageInfo> {
        match self.node(id)? {
            MemoryNode::Page { title, relations, .. } => Ok(PageInfo {
                title: title.clone(),
                relations: relations.clone(),
            }),
            _ => Ok(PageInfo::default()),
        }
    }

    async fn children(&self, id: &str) -> Result<Vec<Block>> {
        match self.node(id)? {
            MemoryNode::Page { children, .. } | MemoryNode::Block { children } => Ok(children.clone()),
            MemoryNode::Collection { .. } => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::BlockType;

    const SNAPSHOT: &str = r#"{
        "root": {"kind": "page", "title": "Panduan", "children": [
            {"id": "b1", "type": "heading_1", "text": "Login"},
            {"id": "db", "type": "child_database"}
        ]},
        "db": {"kind": "collection", "pages": ["p1"]},
        "p1": {"kind": "page", "title": "Akun", "relations": ["root"]}
    }"#;

    #[tokio::test]
    async fn test_snapshot_round_trip_through_trait() {
        let source = MemorySource::from_json(SNAPSHOT).unwrap();
        assert_eq!(source.len(), 3);

        assert_eq!(source.kind("db").await.unwrap(), NodeKind::Collection);
        assert_eq!(source.collection_pages("db").await.unwrap(), vec!["p1"]);

        let info = ContentSource::page(&source, "p1").await.unwrap();
        assert_eq!(info.title.as_deref(), Some("Akun"));
        assert_eq!(info.relations, vec!["root"]);

        let children = source.children("root").await.unwrap();
        assert_eq!(children[0].block_type, BlockType::Heading1);
        assert_eq!(children[1].block_type, BlockType::ChildDatabase);
        assert!(source.children("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_node() {
        let source = MemorySource::new();
        assert!(matches!(source.kind("nope").await, Err(IngestError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, SNAPSHOT).unwrap();
        assert_eq!(MemorySource::load(&path).unwrap().len(), 3);

        assert!(matches!(
            MemorySource::load(dir.path().join("missing.json")),
            Err(IngestError::Io(_))
        ));
    }
}
