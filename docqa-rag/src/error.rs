//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in ingestion and retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The file suffix does not map to a supported [`DocumentFormat`](crate::DocumentFormat).
    #[error("Unsupported file type: {extension:?}")]
    UnsupportedFileType {
        /// The lowercase extension that was rejected (empty when there was none).
        extension: String,
    },

    /// A supported file could not be read or parsed.
    #[error("Extraction error ({path}): {message}")]
    ExtractionError {
        /// The file being extracted.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The persisted index does not match the expected format, version or dimensions.
    #[error("Corrupt index at {path}: {message}")]
    CorruptIndex {
        /// Location of the serialized index.
        path: PathBuf,
        /// A description of the mismatch.
        message: String,
    },

    /// Writing the index to durable storage failed.
    #[error("Failed to persist index to {path}: {message}")]
    PersistenceError {
        /// Location of the serialized index.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// An I/O error outside of index persistence.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Failure talking to the remote completion model.
///
/// Never surfaces through the chat endpoint; the
/// [`AnswerGenerator`](crate::AnswerGenerator) turns it into a fixed
/// user-facing answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteModelError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established or was interrupted.
    #[error("network error: {0}")]
    Network(String),

    /// The provider rejected the request due to quota or rate limits.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider returned a 5xx response.
    #[error("service unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Provider error detail.
        message: String,
    },

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The provider rejected the request as invalid.
    #[error("bad request ({status}): {message}")]
    BadRequest {
        /// HTTP status code.
        status: u16,
        /// Provider error detail.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The response decoded but carried no text.
    #[error("model returned no text")]
    EmptyResponse,
}

impl RemoteModelError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network(_) | Self::RateLimited(_) | Self::Unavailable { .. }
        )
    }
}
