//! Data types for retrieved documents and the context built from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A document returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    /// Identifier of the stored document.
    pub id: String,
    /// The stored text.
    pub content: String,
    /// Key-value metadata attached to the document.
    pub metadata: HashMap<String, String>,
    /// Cosine similarity to the query (higher is more relevant).
    pub similarity: f64,
}

impl RetrievedDocument {
    /// Create a document without metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>, similarity: f64) -> Self {
        Self { id: id.into(), content: content.into(), metadata: HashMap::new(), similarity }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Retrieved documents plus the prompt text rendered from them.
///
/// Built fresh for every question; an empty `formatted_context` means no
/// context is available and generation switches to its plain prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RagContext {
    /// Documents in the order the index returned them.
    pub documents: Vec<RetrievedDocument>,
    /// Prompt-ready rendering of `documents`.
    pub formatted_context: String,
}

impl RagContext {
    /// Whether any context was retrieved.
    pub fn is_empty(&self) -> bool {
        self.formatted_context.is_empty()
    }
}
