//! Answer generation from retrieved context.
//!
//! [`AnswerGenerator`] retrieves the closest chunks for a question, assembles
//! a grounded prompt and asks a [`CompletionModel`] for the answer. Remote
//! model failures never reach the caller: they are logged and replaced with
//! [`GENERATION_FAILED_ANSWER`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::document::SearchResult;
use crate::error::{RemoteModelError, Result};
use crate::index::VectorIndex;

/// Returned when retrieval finds nothing; the model is not called.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant information in the database.";

/// Returned when the remote model call fails for any reason.
pub const GENERATION_FAILED_ANSWER: &str = "An error occurred while generating the response.";

/// The phrase the model is told to use when the context lacks the answer.
pub const UNKNOWN_ANSWER_SENTINEL: &str = "I don't know";

/// A remote text-completion backend.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Model identifier used in logs.
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, RemoteModelError>;
}

/// Join chunk texts in retrieval order, separated by blank lines.
pub fn build_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

/// Build the grounded prompt sent to the model.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a knowledgeable and concise assistant.\n\
         Use only the information provided in the context to answer the user's question.\n\
         If the answer is not present in the context, say \"{UNKNOWN_ANSWER_SENTINEL}\".\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Answer:\n"
    )
}

/// Retrieve → prompt → generate.
pub struct AnswerGenerator {
    index: Arc<VectorIndex>,
    model: Arc<dyn CompletionModel>,
}

impl AnswerGenerator {
    /// Create a generator over `index` using `model`.
    pub fn new(index: Arc<VectorIndex>, model: Arc<dyn CompletionModel>) -> Self {
        Self { index, model }
    }

    /// Answer `question` from the `k` closest chunks.
    ///
    /// # Errors
    ///
    /// Only retrieval failures are returned. An empty retrieval yields
    /// [`NO_CONTEXT_ANSWER`] and a model failure yields
    /// [`GENERATION_FAILED_ANSWER`].
    pub async fn answer(&self, question: &str, k: usize) -> Result<String> {
        let results = self.index.search(question, k).await?;
        if results.is_empty() {
            info!(k, "no context retrieved; skipping generation");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let context = build_context(&results);
        let prompt = build_prompt(question, &context);

        match self.model.complete(&prompt).await {
            Ok(text) => {
                info!(model = self.model.name(), context_chunks = results.len(), "answer generated");
                Ok(text.trim().to_string())
            }
            Err(e) => {
                warn!(
                    model = self.model.name(),
                    error = %e,
                    transient = e.is_transient(),
                    "generation failed"
                );
                Ok(GENERATION_FAILED_ANSWER.to_string())
            }
        }
    }
}
