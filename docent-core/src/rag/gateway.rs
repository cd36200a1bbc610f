//! Persisted index gateway.
//!
//! Owns the on-disk index artifact: loading (with an in-process cache),
//! atomic replacement on save, building from chunks, and querying.

use super::embedder::Embedder;
use super::store::FlatIndex;
use super::types::{Chunk, SearchResult};
use super::{RagError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Identity of the artifact a cached index was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArtifactStamp {
    modified: Option<SystemTime>,
    len: u64,
}

struct CachedIndex {
    stamp: ArtifactStamp,
    index: Arc<FlatIndex>,
}

/// Loads, saves, builds and queries the persisted nearest-neighbour index.
///
/// # Consistency
///
/// [`save`](Self::save) writes a sibling temporary file and renames it over
/// the artifact, so a concurrent [`load`](Self::load) observes either the
/// previous index or the new one, never a partial file.
pub struct IndexGateway {
    path: PathBuf,
    embedder: Embedder,
    model: String,
    concurrency: usize,
    cache: RwLock<Option<CachedIndex>>,
}

impl IndexGateway {
    pub fn new(path: impl Into<PathBuf>, embedder: Embedder, model: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            embedder,
            model: model.into(),
            concurrency: 4,
            cache: RwLock::new(None),
        }
    }

    /// Sets how many chunks are embedded concurrently during [`build`](Self::build).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted index, or `None` when no artifact exists yet.
    pub async fn load(&self) -> Result<Option<Arc<FlatIndex>>> {
        let stamp = match stamp_of(&self.path).await? {
            Some(stamp) => stamp,
            None => {
                debug!(path = %self.path.display(), "No persisted index found");
                return Ok(None);
            }
        };

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.stamp == stamp {
                return Ok(Some(Arc::clone(&cached.index)));
            }
        }

        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let index: FlatIndex = serde_json::from_slice(&bytes)?;
        let index = Arc::new(index);

        info!(path = %self.path.display(), entries = index.len(), "Loaded persisted index");
        *self.cache.write().await = Some(CachedIndex {
            stamp,
            index: Arc::clone(&index),
        });

        Ok(Some(index))
    }

    /// Persists `index`, atomically replacing any previous artifact.
    ///
    /// Each save writes its own uniquely named sibling, so overlapping saves
    /// (from this process or another) never share a temporary file.
    pub async fn save(&self, index: FlatIndex) -> Result<()> {
        let bytes = serde_json::to_vec(&index)?;
        let entries = index.len();

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(std::io::Error::other)??;

        info!(path = %self.path.display(), entries, "Saved index");

        // Another writer may have replaced the artifact already; the next
        // load re-reads whatever is on disk.
        *self.cache.write().await = None;
        Ok(())
    }

    /// Embeds every chunk and builds an index in the given order.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<FlatIndex> {
        info!(chunks = chunks.len(), concurrency = self.concurrency, "Building index");
        let embedder = &self.embedder;

        // `buffered` yields in input order, so the index keeps document order.
        let embedded: Vec<(Chunk, Vec<f32>)> = stream::iter(chunks)
            .map(|chunk| async move {
                let embedding = embedder.embed(&chunk.content).await?;
                Ok::<_, RagError>((chunk, embedding))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut index = FlatIndex::new(&self.model);
        for (chunk, embedding) in embedded {
            index.push(chunk, embedding);
        }
        Ok(index)
    }

    /// Embeds `text` and returns the `k` nearest chunks, best first.
    pub async fn query(&self, index: &FlatIndex, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(text).await?;
        let results = index.search(&query_embedding, k);
        debug!(k, found = results.len(), "Index query finished");
        Ok(results)
    }
}

async fn stamp_of(path: &Path) -> Result<Option<ArtifactStamp>> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(Some(ArtifactStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes `bytes` to a fresh temporary file next to `path` and renames it
/// over `path`. The temporary file is removed if anything fails.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".index-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{self, EmbeddingProvider};
    use crate::rag::ChunkMetadata;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Two-dimensional embedding: (letter count, digit count).
    struct CountingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> provider::Result<Vec<f32>> {
            let letters = text.chars().filter(|c| c.is_alphabetic()).count() as f32;
            let digits = text.chars().filter(|c| c.is_ascii_digit()).count() as f32;
            Ok(vec![letters, digits])
        }
    }

    fn gateway(path: &Path) -> IndexGateway {
        let embedder = Embedder::new(Arc::new(CountingEmbedder), Duration::from_secs(5));
        IndexGateway::new(path, embedder, "counting")
    }

    fn chunk(content: &str) -> Chunk {
        Chunk::new(content, ChunkMetadata { category: "Panduan".into(), ..Default::default() })
    }

    #[tokio::test]
    async fn test_load_absent_index() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir.path().join("missing.json"));
        assert!(gateway.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_build_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");
        let gateway = gateway(&path);

        let index = gateway.build(vec![chunk("abc"), chunk("123"), chunk("a1")]).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.entries()[1].chunk.content, "123");
        gateway.save(index).await.unwrap();

        assert!(path.exists());
        assert_eq!(entries_in(path.parent().unwrap()), vec!["index.json"]);

        // A fresh gateway has no cache and must read the artifact.
        let reloaded = IndexGateway::new(&path, gateway.embedder.clone(), "counting")
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.model, "counting");

        let results = gateway.query(&reloaded, "9999", 1).await.unwrap();
        assert_eq!(results[0].chunk.content, "123");
    }

    #[tokio::test]
    async fn test_save_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let gateway = gateway(&path);

        let first = gateway.build(vec![chunk("lama")]).await.unwrap();
        gateway.save(first).await.unwrap();
        assert_eq!(gateway.load().await.unwrap().unwrap().len(), 1);

        let second = gateway.build(vec![chunk("baru"), chunk("baru 2")]).await.unwrap();
        gateway.save(second).await.unwrap();
        let loaded = gateway.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries()[0].chunk.content, "baru");
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(gateway(&path).load().await, Err(RagError::Serde(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_saves_always_leave_a_whole_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        for round in 0..20 {
            // Separate gateways share no cache, like separate processes.
            let mut handles = Vec::new();
            for writer in 0..4usize {
                let path = path.clone();
                handles.push(tokio::spawn(async move {
                    let gateway = gateway(&path);
                    let chunks = (0..=writer).map(|i| chunk(&format!("r{round} w{writer} c{i}"))).collect();
                    let index = gateway.build(chunks).await?;
                    gateway.save(index).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let loaded = gateway(&path).load().await.unwrap().unwrap();
            assert!((1..=4).contains(&loaded.len()));
        }

        assert_eq!(entries_in(dir.path()), vec!["index.json"]);
    }

    #[tokio::test]
    async fn test_save_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let ours = gateway(&path);
        let theirs = gateway(&path);

        ours.save(ours.build(vec![chunk("satu")]).await.unwrap()).await.unwrap();
        theirs.save(theirs.build(vec![chunk("dua"), chunk("tiga 3")]).await.unwrap()).await.unwrap();

        assert_eq!(ours.load().await.unwrap().unwrap().len(), 2);
    }

    fn entries_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
