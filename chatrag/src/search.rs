//! Similarity search trait for querying an existing vector index.

use async_trait::async_trait;
use tracing::warn;

use crate::document::RetrievedDocument;
use crate::error::Result;

/// A read-only vector index queried by cosine similarity.
///
/// Implementations return documents in the order the index ranks them
/// (descending similarity). They do not deduplicate or re-sort.
///
/// # Example
///
/// ```rust,ignore
/// use chatrag::{InMemorySearch, SimilaritySearch};
///
/// let index = InMemorySearch::new();
/// let documents = index.search(&query_embedding, 0.5, 5).await?;
/// ```
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return at most `limit` documents whose similarity is at least `threshold`.
    async fn search(
        &self,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Short backend name used in logs.
    fn name(&self) -> &str {
        "search"
    }
}

/// Run a search, degrading any failure to an empty result.
///
/// An unavailable index must lower answer quality, never availability, so
/// errors are logged as warnings and swallowed here.
pub async fn search_or_empty(
    search: &dyn SimilaritySearch,
    embedding: &[f32],
    threshold: f32,
    limit: usize,
) -> Vec<RetrievedDocument> {
    match search.search(embedding, threshold, limit).await {
        Ok(documents) => documents,
        Err(e) => {
            warn!(
                backend = search.name(),
                error = %e,
                "similarity search failed, proceeding without context"
            );
            Vec::new()
        }
    }
}
