//! Embedding provider trait for turning a question into a query vector.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. They never retry; a failed call is reported as
/// [`RagError::EmbeddingUnavailable`] or [`RagError::EmbeddingRequestFailed`].
///
/// # Example
///
/// ```rust,ignore
/// use chatrag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Reject vectors that cannot be used as a query.
///
/// An empty vector, or one whose length disagrees with `expected`, would
/// silently mismatch the index column at query time.
pub fn check_embedding(provider: &str, embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.is_empty() {
        return Err(RagError::EmbeddingRequestFailed {
            provider: provider.to_string(),
            message: "response contained no embedding values".into(),
        });
    }
    if embedding.len() != expected {
        return Err(RagError::EmbeddingRequestFailed {
            provider: provider.to_string(),
            message: format!(
                "embedding has {} dimensions, expected {expected}",
                embedding.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vectors_are_unusable() {
        let err = check_embedding("Gemini", &[], 3).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingRequestFailed { .. }));
    }

    #[test]
    fn wrong_length_is_reported() {
        let err = check_embedding("Gemini", &[0.1, 0.2], 3).unwrap_err();
        assert!(err.to_string().contains("2 dimensions, expected 3"));
        assert!(check_embedding("Gemini", &[0.1, 0.2, 0.3], 3).is_ok());
    }
}
