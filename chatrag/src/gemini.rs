//! Gemini embedding and generation clients over the REST API.
//!
//! A single [`GeminiClient`] owns the credential and a lazily built HTTP
//! client. Constructing it does no I/O and never fails; a missing API key
//! surfaces on the first real call. Share one client between
//! [`GeminiEmbeddingProvider`] and [`GeminiGenerator`] with an `Arc`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chatrag::gemini::{GeminiClient, GeminiEmbeddingProvider, GeminiGenerator};
//!
//! let client = Arc::new(GeminiClient::new(Some(api_key), DEFAULT_GEMINI_BASE_URL));
//! let embedder = GeminiEmbeddingProvider::new(client.clone(), "gemini-embedding-001", 768);
//! let generator = GeminiGenerator::new(client, "gemini-3-flash-preview");
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{DEFAULT_HTTP_TIMEOUT_SECS, GeminiSettings};
use crate::embedding::{EmbeddingProvider, check_embedding};
use crate::error::{RagError, Result};
use crate::generation::{ResponseGenerator, build_system_instruction};

const PROVIDER: &str = "Gemini";

/// Shared connection state for the Gemini API.
#[derive(Debug)]
pub struct GeminiClient {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    http: OnceLock<reqwest::Client>,
}

/// Why a Gemini call did not produce a decoded body.
#[derive(Debug)]
enum CallError {
    /// No API key, or the HTTP client could not be built.
    Unconfigured(String),
    /// The request never got a response.
    Transport(String),
    /// The API answered with a non-success status.
    Status { status: StatusCode, detail: String },
    /// The response body did not match the expected schema.
    Decode(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Unconfigured(message) => write!(f, "{message}"),
            CallError::Transport(message) => write!(f, "request failed: {message}"),
            CallError::Status { status, detail } => write!(f, "API returned {status}: {detail}"),
            CallError::Decode(message) => write!(f, "failed to parse response: {message}"),
        }
    }
}

impl CallError {
    /// Whether the failure means the service cannot be used at all, as
    /// opposed to one request going wrong.
    ///
    /// Gemini answers a bad API key with `400 INVALID_ARGUMENT` rather than
    /// `401`, so a 400 whose message names the key counts as well.
    fn is_unavailable(&self) -> bool {
        match self {
            CallError::Unconfigured(_) | CallError::Transport(_) => true,
            CallError::Status { status, detail } => match *status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => true,
                StatusCode::BAD_REQUEST => detail.to_ascii_lowercase().contains("api key"),
                _ => false,
            },
            CallError::Decode(_) => false,
        }
    }
}

impl GeminiClient {
    /// Create a client. No network or validation work happens here.
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            http: OnceLock::new(),
        }
    }

    /// Create a client from loaded settings.
    pub fn from_settings(settings: &GeminiSettings, timeout: Duration) -> Self {
        Self::new(settings.api_key.clone(), settings.base_url.clone()).with_timeout(timeout)
    }

    /// Set the timeout applied to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether an API key was supplied.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> std::result::Result<&str, CallError> {
        self.api_key.as_deref().ok_or_else(|| {
            CallError::Unconfigured(
                "GEMINI_API_KEY is not set. Add it to the environment or a .env file.".into(),
            )
        })
    }

    /// Return the HTTP client, building it on first use.
    fn http(&self) -> std::result::Result<&reqwest::Client, CallError> {
        if let Some(client) = self.http.get() {
            return Ok(client);
        }
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| CallError::Unconfigured(format!("failed to build HTTP client: {e}")))?;
        Ok(self.http.get_or_init(|| client))
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    async fn post_json<Req, Res>(&self, url: &str, body: &Req) -> std::result::Result<Res, CallError>
    where
        Req: Serialize + ?Sized,
        Res: for<'de> Deserialize<'de>,
    {
        let api_key = self.api_key()?;
        let http = self.http()?;

        let response = http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CallError::Status { status, detail });
        }

        response.json().await.map_err(|e| CallError::Decode(e.to_string()))
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self { role: role.map(str::to_string), parts: vec![Part { text: Some(text.to_string()) }] }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content,
    task_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    #[serde(default)]
    embedding: Option<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content.parts.iter().filter_map(|p| p.text.as_deref()).collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embedding ──────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the Gemini `embedContent` endpoint.
///
/// Requests `outputDimensionality` equal to the configured dimensions so
/// the vector always matches the index column, and uses the
/// `RETRIEVAL_QUERY` task type since only questions are embedded here.
pub struct GeminiEmbeddingProvider {
    client: Arc<GeminiClient>,
    model: String,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a provider for `model` producing `dimensions`-long vectors.
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>, dimensions: usize) -> Self {
        Self { client, model: model.into(), dimensions }
    }

    /// Return the configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding single text");

        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        let request = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content::text(None, text),
            task_type: "RETRIEVAL_QUERY",
            output_dimensionality: Some(self.dimensions),
        };

        let url = self.client.model_url(&self.model, "embedContent");
        let response: EmbedContentResponse =
            self.client.post_json(&url, &request).await.map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                let message = e.to_string();
                if e.is_unavailable() {
                    RagError::EmbeddingUnavailable { provider: PROVIDER.into(), message }
                } else {
                    RagError::EmbeddingRequestFailed { provider: PROVIDER.into(), message }
                }
            })?;

        let values = response.embedding.map(|e| e.values).unwrap_or_default();
        check_embedding(PROVIDER, &values, self.dimensions)?;
        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// A [`ResponseGenerator`] backed by the Gemini `generateContent` endpoint.
pub struct GeminiGenerator {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiGenerator {
    /// Create a generator for `model`.
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }

    /// Return the configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ResponseGenerator for GeminiGenerator {
    async fn generate(&self, user_message: &str, context: &str) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            context.present = !context.is_empty(),
            "generating response"
        );

        let request = GenerateContentRequest {
            system_instruction: Content::text(None, &build_system_instruction(context)),
            contents: vec![Content::text(Some("user"), user_message)],
        };

        let url = self.client.model_url(&self.model, "generateContent");
        let response: GenerateContentResponse =
            self.client.post_json(&url, &request).await.map_err(|e| {
                error!(provider = PROVIDER, error = %e, "generation request failed");
                RagError::GenerationUnavailable { provider: PROVIDER.into(), message: e.to_string() }
            })?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(RagError::EmptyGenerationResult { provider: PROVIDER.into() });
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client_without_key() -> Arc<GeminiClient> {
        Arc::new(GeminiClient::new(None, "http://127.0.0.1:9"))
    }

    #[test]
    fn construction_is_lazy() {
        let client = GeminiClient::new(Some("key".into()), "https://example.com/");
        assert!(client.http.get().is_none());
        assert!(client.has_api_key());
        assert_eq!(
            client.model_url("models/gemini-embedding-001", "embedContent"),
            "https://example.com/v1beta/models/gemini-embedding-001:embedContent"
        );
    }

    #[test]
    fn empty_key_counts_as_missing() {
        assert!(!GeminiClient::new(Some(String::new()), "https://example.com").has_api_key());
    }

    #[tokio::test]
    async fn missing_key_makes_embedding_unavailable() {
        let embedder = GeminiEmbeddingProvider::new(client_without_key(), "gemini-embedding-001", 768);
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingUnavailable { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn missing_key_makes_generation_unavailable() {
        let generator = GeminiGenerator::new(client_without_key(), "gemini-3-flash-preview");
        let err = generator.generate("hello", "").await.unwrap_err();
        assert!(matches!(err, RagError::GenerationUnavailable { .. }));
    }

    #[test]
    fn invalid_key_on_bad_request_is_unavailable() {
        let bad_key = CallError::Status {
            status: StatusCode::BAD_REQUEST,
            detail: "API key not valid. Please pass a valid API key.".into(),
        };
        let bad_body = CallError::Status {
            status: StatusCode::BAD_REQUEST,
            detail: "Invalid JSON payload received.".into(),
        };
        assert!(bad_key.is_unavailable());
        assert!(!bad_body.is_unavailable());
        assert!(!CallError::Decode("eof".into()).is_unavailable());
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "Paris " }, { "text": "is the capital." }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response.text(), "Paris is the capital.");
    }

    #[test]
    fn response_without_candidates_has_no_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.text(), "");
    }

    #[test]
    fn embed_request_uses_camel_case_fields() {
        let request = EmbedContentRequest {
            model: "models/gemini-embedding-001".into(),
            content: Content::text(None, "hi"),
            task_type: "RETRIEVAL_QUERY",
            output_dimensionality: Some(768),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(value["outputDimensionality"], 768);
        assert_eq!(value["content"]["parts"][0]["text"], "hi");
        assert!(value["content"].get("role").is_none());
    }
}
