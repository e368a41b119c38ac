//! # chatrag
//!
//! Retrieval-augmented chat against an existing vector index.
//!
//! ## Overview
//!
//! Each user message goes through one pipeline run:
//!
//! 1. embed the question ([`EmbeddingProvider`], Gemini `embedContent`)
//! 2. search the index ([`SimilaritySearch`], Supabase `match_documents`)
//! 3. render the hits into prompt context ([`format_context`])
//! 4. answer with that context in the system instruction
//!    ([`ResponseGenerator`], Gemini `generateContent`)
//!
//! Embedding and generation failures fail the request. Search failures only
//! cost the answer its context.
//!
//! A [`Conversation`] wraps the pipeline in a small state machine: it keeps
//! the message log, serializes requests and publishes every change on a
//! watch channel.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chatrag::{
//!     AppConfig, Conversation, GeminiClient, GeminiEmbeddingProvider, GeminiGenerator,
//!     RagPipeline, SupabaseSearch,
//! };
//!
//! let config = AppConfig::from_env()?;
//! let gemini = Arc::new(GeminiClient::from_settings(&config.gemini, config.http_timeout));
//!
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(GeminiEmbeddingProvider::new(
//!         gemini.clone(),
//!         &config.pipeline.embedding_model,
//!         config.pipeline.embedding_dimensions,
//!     )))
//!     .search(Arc::new(SupabaseSearch::from_settings(&config.supabase, config.http_timeout)?))
//!     .generator(Arc::new(GeminiGenerator::new(gemini, &config.pipeline.chat_model)))
//!     .config(config.pipeline)
//!     .build()?;
//!
//! let conversation = Conversation::new(Arc::new(pipeline));
//! conversation.submit("What is the capital of France?").wait().await;
//! ```

pub mod config;
pub mod context;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod identity;
pub mod inmemory;
pub mod pipeline;
pub mod search;
pub mod supabase;

pub use config::{AppConfig, GeminiSettings, PipelineConfig, PipelineConfigBuilder, SupabaseSettings};
pub use context::{format_context, format_similarity};
pub use conversation::{
    ChatMessage, Conversation, ConversationState, PendingTurn, Phase, Responder, Role, Submission,
    TurnOutcome,
};
pub use document::{RagContext, RetrievedDocument};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use gemini::{GeminiClient, GeminiEmbeddingProvider, GeminiGenerator};
pub use generation::{ResponseGenerator, build_system_instruction};
pub use identity::{EnvIdentity, Identity, IdentityProvider, StaticIdentity, require_identity};
pub use inmemory::InMemorySearch;
pub use pipeline::{RagAnswer, RagPipeline, RagPipelineBuilder};
pub use search::{SimilaritySearch, search_or_empty};
pub use supabase::SupabaseSearch;
