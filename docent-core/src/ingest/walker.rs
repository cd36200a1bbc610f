//! Depth-first traversal of a content tree into chunks.

use super::{ContentSource, IngestError, NodeKind, PageInfo, Result};
use crate::rag::Chunk;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one walk over the content tree.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Chunks in emission order, not yet deduplicated.
    pub chunks: Vec<Chunk>,
    /// Distinct node ids visited.
    pub visited: usize,
    /// Nodes whose subtree was skipped after a source error.
    pub skipped: usize,
}

/// Walks the tree reachable from `root_id`.
///
/// Each node id is processed at most once, however many paths (child links
/// or relations) lead to it, so cyclic relations terminate. Source errors
/// never abort the walk: the failing node's subtree is skipped and counted.
/// Every source call is bounded by `timeout`.
pub async fn walk(source: &dyn ContentSource, root_id: &str, timeout: Duration) -> IngestReport {
    let mut walker = Walker {
        source,
        timeout,
        visited: HashSet::new(),
        chunks: Vec::new(),
        skipped: 0,
    };

    walker.visit(root_id, Vec::new()).await;

    info!(
        visited = walker.visited.len(),
        chunks = walker.chunks.len(),
        skipped = walker.skipped,
        "Content walk finished"
    );

    IngestReport {
        chunks: walker.chunks,
        visited: walker.visited.len(),
        skipped: walker.skipped,
    }
}

struct Walker<'s> {
    source: &'s dyn ContentSource,
    timeout: Duration,
    visited: HashSet<String>,
    chunks: Vec<Chunk>,
    skipped: usize,
}

impl<'s> Walker<'s> {
    fn visit<'a>(
        &'a mut self,
        id: &'a str,
        path: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if !self.visited.insert(id.to_string()) {
                return;
            }
            debug!(node = id, path = %path.join("/"), "Visiting node");

            if let Err(e) = self.process(id, &path).await {
                warn!(node = id, error = %e, "Skipping node");
                self.skipped += 1;
            }
        })
    }

    async fn process(&mut self, id: &str, path: &[String]) -> Result<()> {
        let kind = bounded(self.timeout, self.source.kind(id)).await?;

        if kind == NodeKind::Collection {
            let pages = bounded(self.timeout, self.source.collection_pages(id)).await?;
            debug!(node = id, pages = pages.len(), "Walking collection");
            for page in &pages {
                self.visit(page, path.to_vec()).await;
            }
            return Ok(());
        }

        let info = if kind == NodeKind::Page {
            match bounded(self.timeout, self.source.page(id)).await {
                Ok(info) => info,
                Err(e) => {
                    debug!(node = id, error = %e, "Page properties unavailable");
                    PageInfo::default()
                }
            }
        } else {
            PageInfo::default()
        };

        let title = info.title.filter(|t| !t.is_empty());
        let mut current_path = path.to_vec();
        if let Some(title) = &title {
            current_path.push(title.clone());
        }
        let title = title.unwrap_or_default();

        for related in &info.relations {
            self.visit(related, current_path.clone()).await;
        }

        let children = bounded(self.timeout, self.source.children(id)).await?;
        debug!(node = id, blocks = children.len(), "Walking child blocks");

        let mut run: Vec<String> = Vec::new();
        for child in &children {
            if child.block_type.is_container() {
                self.flush(&current_path, &title, &mut run);
                self.visit(&child.id, current_path.clone()).await;
                continue;
            }

            let text = child.text_content();
            if child.block_type.is_heading() && !text.is_empty() {
                self.flush(&current_path, &title, &mut run);
                run.push(text.to_string());
            } else if !text.is_empty() {
                run.push(text.to_string());
            }

            if child.has_children {
                self.flush(&current_path, &title, &mut run);
                self.visit(&child.id, current_path.clone()).await;
            }
        }

        self.flush(&current_path, &title, &mut run);
        Ok(())
    }

    /// Emits the accumulated run as a chunk; an empty run emits nothing.
    fn flush(&mut self, path: &[String], title: &str, run: &mut Vec<String>) {
        if run.is_empty() {
            return;
        }
        self.chunks.push(Chunk::from_path(path, title, run));
        run.clear();
    }
}

async fn bounded<T>(timeout: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| IngestError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{dedupe, Block, BlockType, MemorySource};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn para(id: &str, text: &str) -> Block {
        Block::new(id, BlockType::Paragraph, text)
    }

    fn heading(id: &str, text: &str) -> Block {
        Block::new(id, BlockType::Heading2, text)
    }

    /// Counts `children` calls per node on top of a memory source.
    struct Counting {
        inner: MemorySource,
        calls: Mutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl ContentSource for Counting {
        async fn kind(&self, id: &str) -> Result<NodeKind> {
            self.inner.kind(id).await
        }
        async fn collection_pages(&self, id: &str) -> Result<Vec<String>> {
            self.inner.collection_pages(id).await
        }
        async fn page(&self, id: &str) -> Result<PageInfo> {
            ContentSource::page(&self.inner, id).await
        }
        async fn children(&self, id: &str) -> Result<Vec<Block>> {
            *self.calls.lock().unwrap().entry(id.to_string()).or_default() += 1;
            self.inner.children(id).await
        }
    }

    #[tokio::test]
    async fn test_headings_split_runs() {
        let source = MemorySource::new().page(
            "root",
            Some("Panduan"),
            vec![],
            vec![
                para("b1", "Pengantar"),
                heading("b2", "Login"),
                para("b3", "Buka halaman masuk."),
                para("b4", "   "),
                heading("b5", "Logout"),
                para("b6", "Klik keluar."),
            ],
        );

        let report = walk(&source, "root", TIMEOUT).await;
        let contents: Vec<&str> = report.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Path: Panduan\n\nPengantar",
                "Path: Panduan\n\nLogin\nBuka halaman masuk.",
                "Path: Panduan\n\nLogout\nKlik keluar.",
            ]
        );
        assert!(report.chunks.iter().all(|c| c.metadata.category == "Panduan"));
        assert!(report.chunks.iter().all(|c| c.metadata.subcategory.is_none()));
        assert_eq!(report.chunks[0].metadata.title, "Panduan");
    }

    #[tokio::test]
    async fn test_child_pages_extend_path_and_collections_do_not() {
        let source = MemorySource::new()
            .page(
                "root",
                Some("IOSS"),
                vec![],
                vec![
                    para("r1", "Sebelum"),
                    Block::new("db", BlockType::ChildDatabase, ""),
                    para("r2", "Sesudah"),
                ],
            )
            .collection("db", vec!["p1", "p2"])
            .page("p1", Some("Akun"), vec![], vec![para("p1b", "Isi akun")])
            .page("p2", Some("Tagihan"), vec![], vec![para("p2b", "Isi tagihan")]);

        let report = walk(&source, "root", TIMEOUT).await;
        let sources: Vec<&str> = report.chunks.iter().map(|c| c.metadata.source.as_str()).collect();
        assert_eq!(sources, vec!["IOSS", "IOSS > Akun", "IOSS > Tagihan", "IOSS"]);
        assert_eq!(report.chunks[1].metadata.category, "IOSS");
        assert_eq!(report.chunks[1].metadata.subcategory.as_deref(), Some("Akun"));
        assert_eq!(report.visited, 4);
    }

    #[tokio::test]
    async fn test_nested_block_children_flush_and_recurse() {
        let source = MemorySource::new()
            .page(
                "root",
                Some("FAQ"),
                vec![],
                vec![
                    para("a", "Satu"),
                    Block::new("t", BlockType::Toggle, "Pertanyaan").with_children(),
                    para("b", "Dua"),
                ],
            )
            .block("t", vec![para("t1", "Jawaban tersembunyi")]);

        let report = walk(&source, "root", TIMEOUT).await;
        let contents: Vec<&str> = report.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Path: FAQ\n\nSatu\nPertanyaan",
                "Path: FAQ\n\nJawaban tersembunyi",
                "Path: FAQ\n\nDua",
            ]
        );
    }

    #[tokio::test]
    async fn test_relation_cycle_terminates_and_visits_once() {
        let source = MemorySource::new()
            .page("a", Some("A"), vec!["b"], vec![para("a1", "Teks A")])
            .page("b", Some("B"), vec!["a", "b"], vec![para("b1", "Teks B")]);
        let counting = Counting { inner: source, calls: Mutex::new(HashMap::new()) };

        let report = walk(&counting, "a", TIMEOUT).await;
        assert_eq!(report.visited, 2);
        let calls = counting.calls.lock().unwrap();
        assert_eq!(calls.get("a"), Some(&1));
        assert_eq!(calls.get("b"), Some(&1));

        // Relations are walked before the page's own blocks, under the page's path.
        let sources: Vec<&str> = report.chunks.iter().map(|c| c.metadata.source.as_str()).collect();
        assert_eq!(sources, vec!["A > B", "A"]);
    }

    #[tokio::test]
    async fn test_failing_subtree_is_skipped() {
        let source = MemorySource::new().page(
            "root",
            Some("Root"),
            vec![],
            vec![
                para("r1", "Awal"),
                Block::new("missing", BlockType::ChildPage, ""),
                para("r2", "Akhir"),
            ],
        );

        let report = walk(&source, "root", TIMEOUT).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.chunks.len(), 2);
        assert_eq!(report.chunks[1].content, "Path: Root\n\nAkhir");
    }

    #[tokio::test]
    async fn test_duplicate_content_from_two_paths_dedupes() {
        let source = MemorySource::new()
            .page(
                "root",
                None,
                vec![],
                vec![
                    Block::new("x", BlockType::ChildPage, ""),
                    Block::new("y", BlockType::ChildPage, ""),
                ],
            )
            .page("x", Some("Sama"), vec![], vec![para("x1", "Konten")])
            .page("y", Some("Sama"), vec![], vec![para("y1", "Konten")]);

        let report = walk(&source, "root", TIMEOUT).await;
        assert_eq!(report.chunks.len(), 2);
        let unique = dedupe(report.chunks);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].content, "Path: Sama\n\nKonten");
    }

    #[tokio::test]
    async fn test_untitled_root_is_uncategorized() {
        let source = MemorySource::new().page("root", None, vec![], vec![para("r", "Teks lepas")]);
        let report = walk(&source, "root", TIMEOUT).await;
        assert_eq!(report.chunks[0].metadata.category, "Uncategorized");
        assert_eq!(report.chunks[0].metadata.source, "");
    }
}
