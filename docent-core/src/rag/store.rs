//! In-memory vector index and search.
//!
//! An exact nearest-neighbour index: every query scores all entries with
//! cosine similarity. The whole index serializes to a single JSON artifact.

use super::types::{Chunk, SearchResult};
use serde::{Deserialize, Serialize};

/// An embedded chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Flat cosine-similarity index over embedded chunks.
///
/// Entries keep their insertion order, and search uses a stable sort, so
/// equal scores always come back in document order.
///
/// # Example
///
/// ```
/// # use docent_core::rag::{Chunk, ChunkMetadata, FlatIndex};
/// let mut index = FlatIndex::new("test-model");
/// index.push(Chunk::new("cats", ChunkMetadata::default()), vec![1.0, 0.0]);
/// index.push(Chunk::new("dogs", ChunkMetadata::default()), vec![0.0, 1.0]);
///
/// let results = index.search(&[1.0, 0.0], 5);
/// assert_eq!(results[0].chunk.content, "cats");
/// assert_eq!(results[0].score, 1.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    /// Embedding model the vectors came from.
    pub model: String,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: Chunk, embedding: Vec<f32>) {
        self.entries.push(IndexEntry { chunk, embedding });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Returns the `top_k` entries most similar to `query_embedding`.
    ///
    /// May contain fewer than `top_k` results if the index is smaller.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        // Stable: ties keep document order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        results
    }
}

/// Computes cosine similarity between two vectors.
///
/// Returns values from -1.0 (opposite) to 1.0 (identical), with 0.0 indicating
/// orthogonal vectors. Returns 0.0 for mismatched lengths or zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::ChunkMetadata;

    fn chunk(content: &str) -> Chunk {
        Chunk::new(content, ChunkMetadata::default())
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_ties_keep_document_order() {
        let mut index = FlatIndex::new("m");
        index.push(chunk("first"), vec![1.0, 1.0]);
        index.push(chunk("far"), vec![-1.0, 0.0]);
        index.push(chunk("second"), vec![1.0, 1.0]);
        index.push(chunk("third"), vec![1.0, 1.0]);

        let results = index.search(&[1.0, 1.0], 3);
        let order: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_search_truncates_to_top_k() {
        let mut index = FlatIndex::new("m");
        for i in 0..10 {
            index.push(chunk(&format!("doc {}", i)), vec![1.0, i as f32]);
        }
        assert_eq!(index.search(&[1.0, 0.0], 4).len(), 4);
        assert_eq!(index.search(&[1.0, 0.0], 40).len(), 10);
    }
}
