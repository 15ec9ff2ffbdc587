//! On-device sentence embeddings with `fastembed`.
//!
//! Only available with the `fastembed` feature (on by default).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "fastembed";

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
}

/// An [`EmbeddingProvider`] running the `all-MiniLM-L6-v2` ONNX model in-process.
///
/// The model file is downloaded into the cache directory the first time the
/// provider is created. Construction is blocking; call it from
/// [`tokio::task::spawn_blocking`] inside async code. Inference runs on the
/// blocking pool so it never stalls the runtime.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load the model using fastembed's default cache directory.
    pub fn new() -> Result<Self> {
        Self::load(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
    }

    /// Load the model, caching downloaded files under `cache_dir`.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::load(InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_cache_dir(cache_dir.into()))
    }

    fn load(options: InitOptions) -> Result<Self> {
        let mut model = TextEmbedding::try_new(options.with_show_download_progress(false))
            .map_err(|e| embedding_error(format!("failed to load model: {e}")))?;

        let dimensions = model
            .embed(vec!["test"], None)
            .map_err(|e| embedding_error(format!("model self-test failed: {e}")))?
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| embedding_error("model self-test returned no vector"))?;

        info!(provider = PROVIDER, model = "all-MiniLM-L6-v2", dimensions, "embedding model loaded");
        Ok(Self { model: Arc::new(Mutex::new(model)), dimensions })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| embedding_error("model returned no vector"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|_| embedding_error("model lock poisoned"))?;
            model.embed(owned, None).map_err(|e| embedding_error(format!("inference failed: {e}")))
        })
        .await
        .map_err(|e| embedding_error(format!("embedding task failed: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
