//! HTTP helpers shared by the hosted embedding and completion backends.

use std::time::Duration;

use serde::Deserialize;

use crate::error::RagError;

/// Request timeout for embedding calls.
pub(crate) const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// `error.message` from a JSON error body, or the raw body when it has another shape.
pub(crate) fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorEnvelope>(&body).map(|e| e.error.message).unwrap_or(body)
}

pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

pub(crate) fn embedding_error(provider: &str, message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: provider.to_string(), message: message.into() }
}
