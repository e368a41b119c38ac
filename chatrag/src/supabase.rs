//! Supabase similarity search backend.
//!
//! Provides [`SupabaseSearch`], which calls the `match_documents` Postgres
//! function through Supabase's PostgREST RPC endpoint.
//!
//! # Prerequisites
//!
//! The project must expose a function with this shape (pgvector):
//!
//! ```sql
//! create function match_documents(
//!   query_embedding vector(768),
//!   match_threshold float,
//!   match_count int
//! ) returns table (id bigint, content text, metadata jsonb, similarity float)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use chatrag::supabase::SupabaseSearch;
//!
//! let search = SupabaseSearch::new("https://xyz.supabase.co", "anon-key")?;
//! let documents = search.search(&query_embedding, 0.5, 5).await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{DEFAULT_HTTP_TIMEOUT_SECS, SupabaseSettings};
use crate::document::RetrievedDocument;
use crate::error::{RagError, Result};
use crate::search::SimilaritySearch;

/// Name of the Postgres function performing the similarity search.
pub const MATCH_DOCUMENTS_RPC: &str = "match_documents";

const BACKEND: &str = "Supabase";

/// A [`SimilaritySearch`] backed by a Supabase `match_documents` RPC.
pub struct SupabaseSearch {
    client: reqwest::Client,
    rpc_url: String,
    anon_key: String,
}

impl SupabaseSearch {
    /// Create a search client for the given project URL and anon key.
    pub fn new(project_url: impl AsRef<str>, anon_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(project_url, anon_key, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    /// Create a search client from loaded settings.
    pub fn from_settings(settings: &SupabaseSettings, timeout: Duration) -> Result<Self> {
        Self::with_timeout(&settings.url, settings.anon_key.clone(), timeout)
    }

    /// Create a search client with an explicit HTTP timeout.
    pub fn with_timeout(
        project_url: impl AsRef<str>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let anon_key = anon_key.into();
        if anon_key.is_empty() {
            return Err(RagError::ConfigError("Supabase anon key must not be empty".into()));
        }
        let base = project_url.as_ref().trim_end_matches('/');
        if base.is_empty() {
            return Err(RagError::ConfigError("Supabase URL must not be empty".into()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            RagError::ConfigError(format!("failed to build Supabase HTTP client: {e}"))
        })?;

        Ok(Self { client, rpc_url: format!("{base}/rest/v1/rpc/{MATCH_DOCUMENTS_RPC}"), anon_key })
    }

    fn map_err(message: impl Into<String>) -> RagError {
        RagError::SearchFailed { backend: BACKEND.to_string(), message: message.into() }
    }
}

// ── match_documents request/response ───────────────────────────────

#[derive(Serialize)]
struct MatchDocumentsParams<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

/// Convert a raw `match_documents` row into a document.
///
/// Missing or mistyped fields fall back to safe defaults instead of
/// failing the whole search.
pub fn row_to_document(row: &Value) -> RetrievedDocument {
    let id = match row.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let content = row.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    let similarity = row.get("similarity").and_then(Value::as_f64).unwrap_or(0.0);

    let metadata = match row.get("metadata") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => HashMap::new(),
    };

    RetrievedDocument { id, content, metadata, similarity }
}

#[async_trait]
impl SimilaritySearch for SupabaseSearch {
    async fn search(
        &self,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        debug!(backend = BACKEND, dims = embedding.len(), threshold, limit, "match_documents");

        let params = MatchDocumentsParams {
            query_embedding: embedding,
            match_threshold: threshold,
            match_count: limit,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&params)
            .send()
            .await
            .map_err(|e| Self::map_err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(Self::map_err(format!("RPC returned {status}: {detail}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Self::map_err(format!("failed to parse response: {e}")))?;

        let documents: Vec<RetrievedDocument> = match body {
            Value::Array(rows) => rows.iter().map(row_to_document).collect(),
            _ => Vec::new(),
        };

        debug!(backend = BACKEND, result_count = documents.len(), "match_documents completed");
        Ok(documents)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
