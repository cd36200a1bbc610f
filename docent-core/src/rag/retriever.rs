//! Two-phase retrieval with scope inference.
//!
//! Phase one finds a topical neighbourhood for the query. Phase two searches
//! again using the dominant scope label itself as the query text and keeps
//! only chunks inside that scope, trading literal similarity to the question
//! for completeness within the topic.

use super::gateway::IndexGateway;
use super::types::{Chunk, RetrievalResult, ScopeLevel, SearchResult};
use super::Result;
use crate::config::RetrievalConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Separator placed between formatted chunks in the final context.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

pub struct Retriever {
    gateway: Arc<IndexGateway>,
    k_neighbors: usize,
    max_docs: usize,
}

impl Retriever {
    pub fn new(gateway: Arc<IndexGateway>, config: &RetrievalConfig) -> Self {
        Self {
            gateway,
            k_neighbors: config.k_neighbors,
            max_docs: config.max_docs,
        }
    }

    /// Finds context for `query`, formatted for a prompt.
    ///
    /// Returns an empty string when there is no index yet or nothing matched.
    pub async fn search(&self, query: &str) -> Result<String> {
        match self.retrieve(query).await? {
            Some(result) => Ok(format_context(&result.chunks)),
            None => Ok(String::new()),
        }
    }

    /// Runs both retrieval phases and returns the surviving chunks.
    pub async fn retrieve(&self, query: &str) -> Result<Option<RetrievalResult>> {
        let Some(index) = self.gateway.load().await? else {
            warn!("Index not built yet; returning empty context");
            return Ok(None);
        };

        debug!(k = self.k_neighbors, "Searching initial candidates");
        let candidates = self.gateway.query(&index, query, self.k_neighbors).await?;
        if candidates.is_empty() {
            info!("No candidates found");
            return Ok(None);
        }

        let Some((scope_level, scope_value)) = infer_scope(&candidates) else {
            return Ok(None);
        };
        info!(level = %scope_level, value = %scope_value, candidates = candidates.len(), "Dominant scope");

        let expanded = self
            .gateway
            .query(&index, &scope_value, self.max_docs * 2)
            .await?;
        let chunks: Vec<Chunk> = expanded
            .into_iter()
            .map(|result| result.chunk)
            .filter(|chunk| scope_level.value_of(&chunk.metadata) == Some(scope_value.as_str()))
            .take(self.max_docs)
            .collect();

        for chunk in &chunks {
            debug!(source = %chunk.metadata.source, "Retrieved chunk");
        }

        Ok(Some(RetrievalResult {
            chunks,
            scope_level,
            scope_value,
        }))
    }
}

/// Picks the dominant scope among candidates.
///
/// Priority is topic, then subcategory, then category; within a level the most
/// frequent value wins and ties go to the value seen first.
pub fn infer_scope(candidates: &[SearchResult]) -> Option<(ScopeLevel, String)> {
    [ScopeLevel::Topic, ScopeLevel::Subcategory, ScopeLevel::Category]
        .into_iter()
        .find_map(|level| {
            most_frequent(
                candidates
                    .iter()
                    .filter_map(|result| level.value_of(&result.chunk.metadata)),
            )
            .map(|value| (level, value.to_string()))
        })
}

/// Most frequent item; among equals, the one encountered first.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// Formats chunks as `[path: <source>]\n<content>` blocks.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("[path: {}]\n{}", chunk.metadata.source, chunk.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
