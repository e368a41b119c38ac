//! Error types for the `chatrag` crate.

use thiserror::Error;

/// Errors that can occur while answering a chat message.
///
/// Only the embedding and generation variants ever fail a whole request.
/// [`RagError::SearchFailed`] is reported by search backends but absorbed by
/// the pipeline, which continues with an empty context.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding endpoint could not be reached or is misconfigured.
    #[error("Embedding service unavailable ({provider}): {message}")]
    EmbeddingUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding call completed but produced no usable vector.
    #[error("Embedding request failed ({provider}): {message}")]
    EmbeddingRequestFailed {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The similarity search backend failed.
    #[error("Similarity search failed ({backend}): {message}")]
    SearchFailed {
        /// The search backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation endpoint could not be reached or rejected the call.
    #[error("Generation service unavailable ({provider}): {message}")]
    GenerationUnavailable {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation call succeeded but returned no text.
    #[error("{provider} returned an empty response.")]
    EmptyGenerationResult {
        /// The generation provider that produced the empty answer.
        provider: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration itself.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// No authenticated identity is available, so chat stays disabled.
    #[error("Not signed in: {0}")]
    Unauthenticated(String),
}

impl RagError {
    /// Whether this error aborts the request it occurred in.
    ///
    /// Search failures degrade the answer instead of failing it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RagError::SearchFailed { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
