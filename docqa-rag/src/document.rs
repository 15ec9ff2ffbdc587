//! Data types for extracted text, chunks, index entries and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The extracted text of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Path of the file the text came from.
    pub source_path: String,
    /// The full extracted text.
    pub text: String,
}

impl SourceText {
    /// Pair extracted text with the path it was read from.
    pub fn new(source_path: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source_path: source_path.into(), text: text.into() }
    }

    /// The file name component of the source path, used in chunk IDs.
    pub fn file_name(&self) -> &str {
        self.source_path.rsplit(['/', '\\']).next().unwrap_or(&self.source_path)
    }
}

/// A segment of a source document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk: `{file name}_{sequence}`.
    pub id: String,
    /// The text content of the chunk, an exact slice of the source text.
    pub text: String,
    /// Path of the file the chunk was cut from.
    pub source_path: String,
    /// Character offset of the chunk start within the source text.
    pub start_offset: usize,
    /// Position of the chunk within its document.
    pub sequence: usize,
    /// Key-value metadata (`source`, `chunk_index`, ...).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A stored [`Chunk`] together with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The chunk.
    pub chunk: Chunk,
    /// The embedding of `chunk.text`.
    pub vector: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
