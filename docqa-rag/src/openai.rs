//! OpenAI-compatible embeddings over `POST {base_url}/embeddings`.
//!
//! Only available with the `openai` feature.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::remote::{EMBEDDING_TIMEOUT, build_client, embedding_error, error_detail};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "openai";

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings endpoint.
///
/// Large batches are split into requests of at most
/// [`MAX_INPUTS_PER_REQUEST`](Self::MAX_INPUTS_PER_REQUEST) inputs. The
/// response `data` array is put back into input order by its `index`
/// field before vectors are returned.
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new(std::env::var("OPENAI_API_KEY")?)?
///     .with_model("text-embedding-3-large")
///     .with_dimensions(1024);
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
    truncate_to: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Upper bound on `input` entries the API accepts in one call.
    pub const MAX_INPUTS_PER_REQUEST: usize = 2048;

    const DEFAULT_MODEL: &'static str = "text-embedding-3-small";
    const DEFAULT_DIMENSIONS: usize = 1536;

    /// `text-embedding-3-small` with its native 1536 dimensions.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(embedding_error(PROVIDER, "API key must not be empty"));
        }
        Ok(Self {
            client: Self::client(EMBEDDING_TIMEOUT)?,
            api_key,
            endpoint: format!("{OPENAI_BASE_URL}/embeddings"),
            model: Self::DEFAULT_MODEL.into(),
            dimensions: Self::DEFAULT_DIMENSIONS,
            truncate_to: None,
        })
    }

    fn client(timeout: Duration) -> Result<reqwest::Client> {
        build_client(timeout)
            .map_err(|e| embedding_error(PROVIDER, format!("failed to build HTTP client: {e}")))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send requests to `{base_url}/embeddings` instead of api.openai.com.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint = format!("{}/embeddings", base_url.into().trim_end_matches('/'));
        self
    }

    /// Ask the API to shorten vectors to `dims`; [`dimensions`](EmbeddingProvider::dimensions) follows.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.truncate_to = Some(dims);
        self
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Self::client(timeout)?;
        Ok(self)
    }

    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body =
            EmbeddingsRequest { model: &self.model, input: inputs, dimensions: self.truncate_to };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                embedding_error(PROVIDER, format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(provider = PROVIDER, %status, "embedding API error");
            return Err(embedding_error(PROVIDER, format!("API returned {status}: {detail}")));
        }

        let EmbeddingsResponse { mut data } = response
            .json()
            .await
            .map_err(|e| embedding_error(PROVIDER, format!("failed to parse response: {e}")))?;
        if data.len() != inputs.len() {
            return Err(embedding_error(
                PROVIDER,
                format!("expected {} embeddings, got {}", inputs.len(), data.len()),
            ));
        }

        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| embedding_error(PROVIDER, "API returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!(provider = PROVIDER, model = %self.model, batch_size = texts.len(), "embedding batch");

        let mut vectors = Vec::with_capacity(texts.len());
        for slice in texts.chunks(Self::MAX_INPUTS_PER_REQUEST) {
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
