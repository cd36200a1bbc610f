//! Content sync: walk the source, rebuild the index, swap it in.

use crate::ingest::{dedupe, walk, ContentSource};
use crate::rag::IndexGateway;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Warning,
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::Success => "success",
            SyncStatus::Warning => "warning",
            SyncStatus::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub message: String,
    /// Unique chunks written to the index.
    pub documents: usize,
}

impl SyncReport {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            message: message.into(),
            documents: 0,
        }
    }
}

/// Rebuilds the persisted index from the content source.
///
/// Runs are serialized; queries keep reading the previous index until the
/// new one has been written completely.
pub struct Syncer {
    source: Option<Arc<dyn ContentSource>>,
    root_id: Option<String>,
    gateway: Arc<IndexGateway>,
    source_timeout: Duration,
    running: Mutex<()>,
}

impl Syncer {
    pub fn new(
        source: Option<Arc<dyn ContentSource>>,
        root_id: Option<String>,
        gateway: Arc<IndexGateway>,
        source_timeout: Duration,
    ) -> Self {
        Self {
            source,
            root_id,
            gateway,
            source_timeout,
            running: Mutex::new(()),
        }
    }

    pub async fn sync(&self) -> SyncReport {
        let Some(root_id) = self.root_id.as_deref() else {
            warn!("Sync requested without a root id");
            return SyncReport::error("Root id tidak ditemukan (atur source.root_id atau NOTION_PAGE_ID).");
        };
        let Some(source) = self.source.as_deref() else {
            warn!("Sync requested without a content source");
            return SyncReport::error("Sumber konten belum dikonfigurasi (atur source.token atau NOTION_API_KEY).");
        };

        let _guard = self.running.lock().await;
        info!(root = root_id, "Starting content sync");

        let report = walk(source, root_id, self.source_timeout).await;
        let chunks = dedupe(report.chunks);
        info!(unique = chunks.len(), skipped = report.skipped, "Walk complete");

        if chunks.is_empty() {
            return SyncReport {
                status: SyncStatus::Warning,
                message: "Tidak ada dokumen untuk di-embed.".to_string(),
                documents: 0,
            };
        }

        let documents = chunks.len();
        let index = match self.gateway.build(chunks).await {
            Ok(index) => index,
            Err(e) => {
                error!(error = %e, "Failed to embed documents");
                return SyncReport::error("Gagal melakukan sinkronisasi data.");
            }
        };

        if let Err(e) = self.gateway.save(index).await {
            error!(error = %e, path = %self.gateway.path().display(), "Failed to persist index");
            return SyncReport::error("Gagal melakukan sinkronisasi data.");
        }

        info!(documents, "Content sync finished");
        SyncReport {
            status: SyncStatus::Success,
            message: format!("Berhasil sinkron {} dokumen.", documents),
            documents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Block, BlockType, MemorySource};
    use crate::provider::{self, EmbeddingProvider, ProviderError};
    use crate::rag::Embedder;
    use async_trait::async_trait;

    struct Constant;

    #[async_trait]
    impl EmbeddingProvider for Constant {
        async fn embed(&self, _text: &str) -> provider::Result<Vec<f32>> {
            Ok(vec![0.5, 0.5])
        }
    }

    struct Unreachable;

    #[async_trait]
    impl EmbeddingProvider for Unreachable {
        async fn embed(&self, _text: &str) -> provider::Result<Vec<f32>> {
            Err(ProviderError::Api("connection refused".into()))
        }
    }

    fn gateway(dir: &tempfile::TempDir, provider: Arc<dyn EmbeddingProvider>) -> Arc<IndexGateway> {
        let embedder = Embedder::new(provider, Duration::from_secs(5));
        Arc::new(IndexGateway::new(dir.path().join("index.json"), embedder, "constant"))
    }

    fn tree() -> Arc<dyn ContentSource> {
        Arc::new(
            MemorySource::new()
                .page(
                    "root",
                    Some("Panduan"),
                    vec!["dup"],
                    vec![
                        Block::new("h1", BlockType::Heading1, "Login"),
                        Block::new("p1", BlockType::Paragraph, "Masuk."),
                        Block::new("h2", BlockType::Heading1, "Logout"),
                        Block::new("p2", BlockType::Paragraph, "Keluar."),
                    ],
                )
                // Same content reached through a relation.
                .page(
                    "dup",
                    None,
                    vec![],
                    vec![
                        Block::new("x1", BlockType::Heading1, "Login"),
                        Block::new("x2", BlockType::Paragraph, "Masuk."),
                    ],
                ),
        )
    }

    #[tokio::test]
    async fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let syncer = Syncer::new(Some(tree()), None, gateway(&dir, Arc::new(Constant)), Duration::from_secs(5));
        let report = syncer.sync().await;
        assert_eq!(report.status, SyncStatus::Error);
        assert!(!dir.path().join("index.json").exists());
    }

    #[tokio::test]
    async fn test_empty_walk_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let source: Arc<dyn ContentSource> = Arc::new(MemorySource::new().page("root", Some("Kosong"), vec![], vec![]));
        let syncer = Syncer::new(Some(source), Some("root".into()), gateway(&dir, Arc::new(Constant)), Duration::from_secs(5));

        let report = syncer.sync().await;
        assert_eq!(report.status, SyncStatus::Warning);
        assert_eq!(report.documents, 0);
    }

    #[tokio::test]
    async fn test_success_persists_unique_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir, Arc::new(Constant));
        let syncer = Syncer::new(Some(tree()), Some("root".into()), Arc::clone(&gateway), Duration::from_secs(5));

        let report = syncer.sync().await;
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.documents, 2);
        assert_eq!(report.message, "Berhasil sinkron 2 dokumen.");

        let index = gateway.load().await.unwrap().unwrap();
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let good = Syncer::new(Some(tree()), Some("root".into()), gateway(&dir, Arc::new(Constant)), Duration::from_secs(5));
        assert_eq!(good.sync().await.status, SyncStatus::Success);

        let broken_gateway = gateway(&dir, Arc::new(Unreachable));
        let broken = Syncer::new(Some(tree()), Some("root".into()), Arc::clone(&broken_gateway), Duration::from_secs(5));
        let report = broken.sync().await;
        assert_eq!(report.status, SyncStatus::Error);
        assert!(!report.message.contains("connection refused"));

        assert_eq!(broken_gateway.load().await.unwrap().unwrap().len(), 2);
    }
}
