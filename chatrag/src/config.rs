//! Configuration for the RAG pipeline and its outbound services.
//!
//! [`PipelineConfig`] is built once at startup and shared read-only by every
//! conversation. [`AppConfig`] bundles it with the service endpoints and
//! credentials, and is normally loaded from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default similarity cutoff for retrieved documents.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;
/// Default number of documents retrieved per question.
pub const DEFAULT_MAX_DOCUMENTS: usize = 5;
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
/// Vector length of the `match_documents` index column.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
/// Default Gemini API root.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default timeout applied to every outbound HTTP call.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Minimum cosine similarity for a document to be retrieved, in `[-1, 1]`.
    pub similarity_threshold: f32,
    /// Maximum number of documents to retrieve.
    pub max_documents: usize,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Chat model identifier.
    pub chat_model: String,
    /// Expected embedding length; must match the search index.
    pub embedding_dimensions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_documents: DEFAULT_MAX_DOCUMENTS,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for constructing a [`PipelineConfig`].
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the minimum similarity threshold. `-1.0` disables filtering.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the maximum number of retrieved documents.
    pub fn max_documents(mut self, count: usize) -> Self {
        self.config.max_documents = count;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the chat model identifier.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    /// Set the expected embedding dimensionality.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    /// Build the [`PipelineConfig`], validating every field.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `similarity_threshold` is not a number in `[-1, 1]`
    /// - `max_documents == 0`
    /// - `embedding_dimensions == 0`
    /// - either model identifier is blank
    pub fn build(self) -> Result<PipelineConfig> {
        let threshold = self.config.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({threshold}) must be within [-1, 1]"
            )));
        }
        if self.config.max_documents == 0 {
            return Err(RagError::ConfigError("max_documents must be greater than zero".into()));
        }
        if self.config.embedding_dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding_dimensions must be greater than zero".into(),
            ));
        }
        if self.config.embedding_model.trim().is_empty() {
            return Err(RagError::ConfigError("embedding_model must not be empty".into()));
        }
        if self.config.chat_model.trim().is_empty() {
            return Err(RagError::ConfigError("chat_model must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Connection settings for the Gemini API.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    /// API key. May be absent; the clients then fail on first use.
    pub api_key: Option<String>,
    /// API root, e.g. `https://generativelanguage.googleapis.com`.
    pub base_url: String,
}

/// Connection settings for the Supabase project holding the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseSettings {
    /// Project URL.
    pub url: String,
    /// Anonymous (row-level-security) API key.
    pub anon_key: String,
}

/// Everything the chat client needs at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Retrieval and model settings.
    pub pipeline: PipelineConfig,
    /// Gemini credential and endpoint.
    pub gemini: GeminiSettings,
    /// Supabase project holding the index.
    pub supabase: SupabaseSettings,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] when `SUPABASE_URL` or
    /// `SUPABASE_ANON_KEY` is missing, when a numeric variable does not
    /// parse, or when the resulting [`PipelineConfig`] fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                RagError::ConfigError(format!("missing {key} environment variable"))
            })
        };

        let mut builder = PipelineConfig::builder();
        if let Some(model) = get("CHATRAG_EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Some(model) = get("CHATRAG_CHAT_MODEL") {
            builder = builder.chat_model(model);
        }
        if let Some(raw) = get("CHATRAG_SIMILARITY_THRESHOLD") {
            builder = builder.similarity_threshold(parse_var("CHATRAG_SIMILARITY_THRESHOLD", &raw)?);
        }
        if let Some(raw) = get("CHATRAG_MAX_DOCUMENTS") {
            builder = builder.max_documents(parse_var("CHATRAG_MAX_DOCUMENTS", &raw)?);
        }
        if let Some(raw) = get("CHATRAG_EMBEDDING_DIMENSIONS") {
            builder = builder.embedding_dimensions(parse_var("CHATRAG_EMBEDDING_DIMENSIONS", &raw)?);
        }
        let pipeline = builder.build()?;

        let timeout_secs = match get("CHATRAG_HTTP_TIMEOUT_SECS") {
            Some(raw) => parse_var("CHATRAG_HTTP_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            pipeline,
            gemini: GeminiSettings {
                api_key: get("GEMINI_API_KEY"),
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            },
            supabase: SupabaseSettings {
                url: require("SUPABASE_URL")?,
                anon_key: require("SUPABASE_ANON_KEY")?,
            },
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| RagError::ConfigError(format!("{key} has an invalid value: '{raw}'")))
}
