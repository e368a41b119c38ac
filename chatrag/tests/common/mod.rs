//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chatrag::conversation::Responder;
use chatrag::document::RetrievedDocument;
use chatrag::embedding::EmbeddingProvider;
use chatrag::error::{RagError, Result};
use chatrag::generation::ResponseGenerator;
use chatrag::search::SimilaritySearch;
use tokio::sync::Notify;

/// Returns a constant vector, or fails when built with [`MockEmbedder::failing`].
pub struct MockEmbedder {
    dims: usize,
    fail: bool,
    pub calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims, fail: false, calls: AtomicUsize::new(0) }
    }

    pub fn failing(dims: usize) -> Self {
        Self { dims, fail: true, calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::EmbeddingUnavailable {
                provider: "Mock".into(),
                message: "connection refused".into(),
            });
        }
        Ok(vec![0.5; self.dims])
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "Mock"
    }
}

/// Returns fixed documents, or fails when built with [`MockSearch::failing`].
pub struct MockSearch {
    documents: Vec<RetrievedDocument>,
    fail: bool,
    pub calls: AtomicUsize,
    pub last_query: Mutex<Option<(usize, f32, usize)>>,
}

impl MockSearch {
    pub fn returning(documents: Vec<RetrievedDocument>) -> Self {
        Self { documents, fail: false, calls: AtomicUsize::new(0), last_query: Mutex::new(None) }
    }

    pub fn failing() -> Self {
        Self {
            documents: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimilaritySearch for MockSearch {
    async fn search(
        &self,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some((embedding.len(), threshold, limit));
        if self.fail {
            return Err(RagError::SearchFailed {
                backend: "Mock".into(),
                message: "relation \"documents\" does not exist".into(),
            });
        }
        Ok(self.documents.clone())
    }
}

/// Records the context of every call and answers with a fixed reply.
pub struct MockGenerator {
    reply: Option<String>,
    pub contexts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), contexts: Mutex::new(Vec::new()) }
    }

    /// Answers with no text.
    pub fn silent() -> Self {
        Self { reply: None, contexts: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseGenerator for MockGenerator {
    async fn generate(&self, _user_message: &str, context: &str) -> Result<String> {
        self.contexts.lock().unwrap().push(context.to_string());
        self.reply.clone().ok_or(RagError::EmptyGenerationResult { provider: "Mock".into() })
    }
}

/// Holds every request until [`GatedResponder::release`] is called.
///
/// A failing responder fails its first request only; later ones answer.
pub struct GatedResponder {
    gate: Notify,
    reply: String,
    error: Mutex<Option<RagError>>,
    pub calls: AtomicUsize,
}

impl GatedResponder {
    pub fn answering(reply: &str) -> Self {
        Self {
            gate: Notify::new(),
            reply: reply.to_string(),
            error: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: RagError) -> Self {
        Self {
            gate: Notify::new(),
            reply: "recovered".to_string(),
            error: Mutex::new(Some(error)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Let one waiting (or the next) request resolve.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Responder for GatedResponder {
    async fn respond(&self, _user_message: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        if let Some(error) = self.error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.reply.clone())
    }
}

/// Answers immediately by echoing the message.
pub struct EchoResponder;

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(&self, user_message: &str) -> Result<String> {
        Ok(format!("echo: {user_message}"))
    }
}
