//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] composes text extraction, a [`Chunker`], a
//! [`VectorIndex`] and an [`AnswerGenerator`] into the two workflows the
//! service exposes: ingesting an uploaded file and answering a question.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, VectorIndex};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .index(Arc::new(index))
//!     .completion_model(Arc::new(model))
//!     .build()?;
//!
//! let added = pipeline.ingest_file(Path::new("pdfs/report.pdf")).await?;
//! let answer = pipeline.answer("What does the report conclude?").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{SearchResult, SourceText};
use crate::error::{RagError, Result};
use crate::extract::extract;
use crate::generation::{AnswerGenerator, CompletionModel};
use crate::index::VectorIndex;

/// The RAG pipeline orchestrator.
///
/// Ingestion runs extract → chunk → embed → store; answering runs
/// search → prompt → generate. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    index: Arc<VectorIndex>,
    generator: AnswerGenerator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Ingest the file at `path`: extract → chunk → embed → store.
    ///
    /// Returns the number of chunks added to the index.
    ///
    /// # Errors
    ///
    /// Propagates [`RagError::UnsupportedFileType`] and
    /// [`RagError::ExtractionError`] from extraction, and embedding or
    /// persistence errors from the index.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize> {
        let text = extract(path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "extraction failed during ingestion");
            e
        })?;
        self.ingest_text(SourceText::new(path.to_string_lossy(), text)).await
    }

    /// Ingest already-extracted text: chunk → embed → store.
    ///
    /// # Errors
    ///
    /// Propagates embedding or persistence errors from the index.
    pub async fn ingest_text(&self, source: SourceText) -> Result<usize> {
        let chunks = self.chunker.chunk(&source);
        if chunks.is_empty() {
            info!(source = %source.source_path, chunk_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        let chunk_count = self.index.insert(chunks).await.map_err(|e| {
            error!(source = %source.source_path, error = %e, "index insertion failed");
            e
        })?;

        info!(source = %source.source_path, chunk_count, "ingested document");
        Ok(chunk_count)
    }

    /// Return the `k` chunks closest to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the query cannot be embedded.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.index.search(query, k).await
    }

    /// Answer `question` from the configured `top_k` chunks.
    ///
    /// # Errors
    ///
    /// Returns an error only when retrieval fails; see [`AnswerGenerator::answer`].
    pub async fn answer(&self, question: &str) -> Result<String> {
        self.generator.answer(question, self.config.top_k).await.map_err(|e| {
            error!(error = %e, "retrieval failed while answering");
            e
        })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `index` and `completion_model` are required. Without an explicit chunker
/// a [`RecursiveChunker`] sized from the config is used.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    index: Option<Arc<VectorIndex>>,
    completion_model: Option<Arc<dyn CompletionModel>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the vector index.
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the remote completion model.
    pub fn completion_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.completion_model = Some(model);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let index =
            self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;
        let model = self
            .completion_model
            .ok_or_else(|| RagError::ConfigError("completion_model is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(RagPipeline {
            generator: AnswerGenerator::new(Arc::clone(&index), model),
            config,
            chunker,
            index,
        })
    }
}
