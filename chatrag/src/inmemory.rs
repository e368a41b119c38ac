//! In-memory similarity search using cosine similarity.
//!
//! This module provides [`InMemorySearch`], a zero-dependency index backed by
//! a `Vec` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and running the chat client without a Supabase
//! project.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::RetrievedDocument;
use crate::error::Result;
use crate::search::SimilaritySearch;

/// A stored document together with its embedding.
#[derive(Debug, Clone)]
struct Entry {
    id: String,
    content: String,
    metadata: std::collections::HashMap<String, String>,
    embedding: Vec<f32>,
}

/// An in-memory index using cosine similarity for search.
///
/// Entries keep their insertion order; ties in similarity are returned in
/// that order.
///
/// # Example
///
/// ```rust,ignore
/// use chatrag::{InMemorySearch, RetrievedDocument, SimilaritySearch};
///
/// let index = InMemorySearch::new();
/// index.insert(RetrievedDocument::new("1", "Paris is the capital of France.", 0.0), vec![0.1, 0.9]).await;
/// let hits = index.search(&[0.1, 0.9], 0.5, 5).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemorySearch {
    entries: RwLock<Vec<Entry>>,
}

impl InMemorySearch {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. Its `similarity` field is ignored and recomputed per query.
    pub async fn insert(&self, document: RetrievedDocument, embedding: Vec<f32>) {
        let mut entries = self.entries.write().await;
        entries.push(Entry {
            id: document.id,
            content: document.content,
            metadata: document.metadata,
            embedding,
        });
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the index holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SimilaritySearch for InMemorySearch {
    async fn search(
        &self,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(f32, &Entry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.embedding, embedding), entry))
            .filter(|(score, _)| *score >= threshold)
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| RetrievedDocument {
                id: entry.id.clone(),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                similarity: f64::from(score),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_minus_one() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn threshold_filters_and_limit_truncates() {
        let index = InMemorySearch::new();
        index.insert(RetrievedDocument::new("a", "aligned", 0.0), vec![1.0, 0.0]).await;
        index.insert(RetrievedDocument::new("b", "diagonal", 0.0), vec![1.0, 1.0]).await;
        index.insert(RetrievedDocument::new("c", "orthogonal", 0.0), vec![0.0, 1.0]).await;

        let hits = index.search(&[1.0, 0.0], 0.5, 5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let everything = index.search(&[1.0, 0.0], -1.0, 2).await.unwrap();
        assert_eq!(everything.len(), 2);
        assert_eq!(index.len().await, 3);
    }
}
