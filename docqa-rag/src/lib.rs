//! # docqa-rag
//!
//! Document ingestion and retrieval-augmented answering for docqa.
//!
//! ## Overview
//!
//! - [`extract`] turns PDF, DOCX and plain-text files into text
//! - [`RecursiveChunker`] cuts text into overlapping chunks with start offsets
//! - [`EmbeddingProvider`] implementations map chunks to vectors
//!   (a local `fastembed` model, OpenAI and Gemini backends, and
//!   [`HashingEmbeddingProvider`] for tests and fully offline use)
//! - [`VectorIndex`] stores `(chunk, vector)` pairs on disk and searches them
//! - [`AnswerGenerator`] builds a grounded prompt and calls a [`CompletionModel`]
//! - [`RagPipeline`] wires the above into ingest and answer workflows
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `fastembed` (default) | [`local_embedding::FastEmbedProvider`] |
//! | `gemini` (default) | [`gemini::GeminiEmbeddingProvider`], [`gemini::GeminiCompletionModel`] |
//! | `openai` (default) | [`openai::OpenAIEmbeddingProvider`] |

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod hashing;
pub mod index;
pub mod pipeline;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "fastembed")]
pub mod local_embedding;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(any(feature = "gemini", feature = "openai"))]
mod remote;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, IndexEntry, SearchResult, SourceText};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, RemoteModelError, Result};
pub use extract::{DocumentFormat, extract};
pub use generation::{
    AnswerGenerator, CompletionModel, GENERATION_FAILED_ANSWER, NO_CONTEXT_ANSWER,
    UNKNOWN_ANSWER_SENTINEL, build_context, build_prompt,
};
pub use hashing::HashingEmbeddingProvider;
pub use index::{DistanceMetric, VectorIndex};
#[cfg(feature = "fastembed")]
pub use local_embedding::FastEmbedProvider;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
