//! Gemini embedding and completion backends over the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RemoteModelError, Result};
use crate::generation::CompletionModel;
use crate::remote::{EMBEDDING_TIMEOUT, build_client, embedding_error, error_detail};

/// The default Generative Language API endpoint.
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default model for answer generation.
pub const DEFAULT_COMPLETION_MODEL: &str = "gemini-2.5-flash";

/// The default model for embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

const PROVIDER: &str = "gemini";

// ── Shared request/response types ──────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl Content {
    fn user_text(text: &str) -> Self {
        Self { role: Some("user".into()), parts: vec![Part { text: Some(text.to_string()) }] }
    }
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the Gemini `batchEmbedContents` endpoint.
///
/// The same task type is used for documents and queries so that a text
/// always maps to the same vector.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new("your-api-key")?.with_output_dimensionality(768);
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    task_type: String,
    output_dimensionality: Option<usize>,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Default embedding dimensions for `gemini-embedding-001`.
    const DEFAULT_DIMENSIONS: usize = 3072;

    /// Create a new provider using the given API key and the default
    /// `gemini-embedding-001` model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(embedding_error(PROVIDER, "API key must not be empty"));
        }
        let client = build_client(EMBEDDING_TIMEOUT)
            .map_err(|e| embedding_error(PROVIDER, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            task_type: "RETRIEVAL_DOCUMENT".into(),
            output_dimensionality: None,
            dimensions: Self::DEFAULT_DIMENSIONS,
        })
    }

    /// Set the embedding model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the task type sent with every request (e.g. `SEMANTIC_SIMILARITY`).
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    /// Set the output dimensionality (truncates the embedding vector).
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.output_dimensionality = Some(dims);
        self.dimensions = dims;
        self
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content,
    task_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingProvider {
    /// Upper bound on `requests` entries in one `batchEmbedContents` call.
    pub const MAX_REQUESTS_PER_BATCH: usize = 100;

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let model = format!("models/{}", self.model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: model.clone(),
                    content: Content { role: None, parts: vec![Part { text: Some(text.to_string()) }] },
                    task_type: &self.task_type,
                    output_dimensionality: self.output_dimensionality,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/{model}:batchEmbedContents", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                embedding_error(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(provider = PROVIDER, %status, "API error");
            return Err(embedding_error(PROVIDER, format!("API returned {status}: {detail}")));
        }

        let parsed: BatchEmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            embedding_error(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(embedding_error(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), parsed.embeddings.len()),
            ));
        }

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| embedding_error(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let mut vectors = Vec::with_capacity(texts.len());
        for slice in texts.chunks(Self::MAX_REQUESTS_PER_BATCH) {
            vectors.extend(self.request(slice).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

// ── Completions ────────────────────────────────────────────────────

/// A [`CompletionModel`] calling Gemini `generateContent`.
///
/// An empty API key is accepted at construction so the service can start
/// without one; every call then fails with [`RemoteModelError::Unauthorized`].
pub struct GeminiCompletionModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiCompletionModel {
    /// Create a client for `model` whose requests time out after `timeout`.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = build_client(timeout).map_err(|e| {
            RagError::ConfigError(format!("failed to build Gemini HTTP client: {e}"))
        })?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.into(),
            model: model.into(),
        })
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Map an HTTP failure status to the matching [`RemoteModelError`].
fn classify_status(status: reqwest::StatusCode, message: String) -> RemoteModelError {
    match status.as_u16() {
        401 | 403 => RemoteModelError::Unauthorized(message),
        429 => RemoteModelError::RateLimited(message),
        code if status.is_server_error() => RemoteModelError::Unavailable { status: code, message },
        code => RemoteModelError::BadRequest { status: code, message },
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GenerateResponse) -> std::result::Result<String, RemoteModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() { Err(RemoteModelError::EmptyResponse) } else { Ok(text) }
}

#[async_trait]
impl CompletionModel for GeminiCompletionModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, RemoteModelError> {
        if self.api_key.is_empty() {
            return Err(RemoteModelError::Unauthorized("GOOGLE_API_KEY is not set".into()));
        }

        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating content");

        let body = GenerateRequest { contents: vec![Content::user_text(prompt)] };
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteModelError::Timeout
                } else {
                    RemoteModelError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response.text().await.unwrap_or_default());
            return Err(classify_status(status, detail));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RemoteModelError::MalformedResponse(e.to_string()))?;
        response_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let err = classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "quota".into());
        assert_eq!(err, RemoteModelError::RateLimited("quota".into()));
        assert!(err.is_transient());

        let err = classify_status(reqwest::StatusCode::FORBIDDEN, "key".into());
        assert!(matches!(err, RemoteModelError::Unauthorized(_)));

        let err = classify_status(reqwest::StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(err, RemoteModelError::Unavailable { status: 502, .. }));

        let err = classify_status(reqwest::StatusCode::NOT_FOUND, String::new());
        assert!(matches!(err, RemoteModelError::BadRequest { status: 404, .. }));
    }

    #[test]
    fn parses_candidate_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"The sky "},{"text":"is blue."}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response_text(parsed).unwrap(), "The sky is blue.");
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(response_text(parsed).unwrap_err(), RemoteModelError::EmptyResponse);
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let model =
            GeminiCompletionModel::new("", DEFAULT_COMPLETION_MODEL, Duration::from_secs(1))
                .unwrap();
        let err = model.complete("hello").await.unwrap_err();
        assert!(matches!(err, RemoteModelError::Unauthorized(_)));
    }
}
