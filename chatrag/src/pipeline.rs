//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] answers one question by composing an
//! [`EmbeddingProvider`], a [`SimilaritySearch`] backend and a
//! [`ResponseGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use chatrag::{PipelineConfig, RagPipeline, SupabaseSearch};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .search(Arc::new(SupabaseSearch::new(url, anon_key)?))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let answer = pipeline.run("What is the capital of France?").await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::context::format_context;
use crate::document::RagContext;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::ResponseGenerator;
use crate::search::{SimilaritySearch, search_or_empty};

/// The RAG pipeline orchestrator.
///
/// Executes embed → search → format → generate for each question. The
/// pipeline holds no per-request state and never retries; it is shared
/// read-only by every conversation. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: PipelineConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn SimilaritySearch>,
    generator: Arc<dyn ResponseGenerator>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the search backend.
    pub fn search(&self) -> &Arc<dyn SimilaritySearch> {
        &self.search
    }

    /// Retrieve context for a question: embed → search → format.
    ///
    /// Search failures are absorbed and yield an empty context.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] for a blank message, and
    /// propagates embedding failures unchanged.
    pub async fn retrieve(&self, user_message: &str) -> Result<RagContext> {
        if user_message.trim().is_empty() {
            return Err(RagError::PipelineError("message must not be empty".into()));
        }

        // 1. Embed the question
        let embedding = self.embedding_provider.embed(user_message).await.map_err(|e| {
            error!(provider = self.embedding_provider.name(), error = %e, "embedding failed");
            e
        })?;

        // 2. Search the index; failures degrade to no context
        let documents = search_or_empty(
            self.search.as_ref(),
            &embedding,
            self.config.similarity_threshold,
            self.config.max_documents,
        )
        .await;

        // 3. Render the prompt context
        Ok(format_context(documents))
    }

    /// Answer a question: retrieve → generate.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] for a blank message, and
    /// propagates embedding and generation failures unchanged.
    pub async fn run(&self, user_message: &str) -> Result<String> {
        self.answer(user_message).await.map(|answer| answer.text)
    }

    /// Like [`run`](Self::run), but also returns the context the answer
    /// was grounded in.
    pub async fn answer(&self, user_message: &str) -> Result<RagAnswer> {
        let context = self.retrieve(user_message).await?;

        let text =
            self.generator.generate(user_message, &context.formatted_context).await.map_err(
                |e| {
                    error!(provider = self.generator.name(), error = %e, "generation failed");
                    e
                },
            )?;

        info!(
            document_count = context.documents.len(),
            answer_len = text.len(),
            "pipeline run completed"
        );

        Ok(RagAnswer { context, text })
    }
}

/// An answer together with the context it was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct RagAnswer {
    /// Documents and rendered context the answer was generated from.
    pub context: RagContext,
    /// The generated answer.
    pub text: String,
}

/// Builder for constructing a [`RagPipeline`].
///
/// Every field is required. Call [`build()`](RagPipelineBuilder::build) to
/// validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<PipelineConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    search: Option<Arc<dyn SimilaritySearch>>,
    generator: Option<Arc<dyn ResponseGenerator>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the similarity search backend.
    pub fn search(mut self, search: Arc<dyn SimilaritySearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any field is missing, or if the
    /// provider's dimensionality disagrees with
    /// [`PipelineConfig::embedding_dimensions`].
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let search =
            self.search.ok_or_else(|| RagError::ConfigError("search is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        if embedding_provider.dimensions() != config.embedding_dimensions {
            return Err(RagError::ConfigError(format!(
                "embedding provider '{}' produces {} dimensions but the index expects {}",
                embedding_provider.name(),
                embedding_provider.dimensions(),
                config.embedding_dimensions
            )));
        }

        Ok(RagPipeline { config, embedding_provider, search, generator })
    }
}
