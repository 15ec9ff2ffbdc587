//! Persistent vector index with exhaustive similarity search.
//!
//! [`VectorIndex`] keeps every `(chunk, vector)` pair in insertion order
//! behind a `tokio::sync::RwLock`. Searches share the read half; an insertion
//! takes the write half for the whole append-and-persist step, so concurrent
//! uploads are serialised and the file on disk always matches memory after a
//! successful call.
//!
//! The on-disk format is a single JSON document:
//!
//! ```json
//! { "format": "docqa-vector-index", "version": 1, "metric": "cosine",
//!   "dimensions": 384, "entries": [ { "chunk": { ... }, "vector": [ ... ] } ] }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::document::{Chunk, IndexEntry, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const INDEX_FORMAT: &str = "docqa-vector-index";
const INDEX_VERSION: u32 = 1;

/// Distance metric used to rank stored vectors against a query.
///
/// Fixed when an index is first created; a persisted index keeps its metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity; score in `[-1, 1]`.
    #[default]
    Cosine,
    /// Euclidean distance; score is the negated distance.
    L2,
}

impl DistanceMetric {
    /// Score `candidate` against `query`. Higher is closer for both metrics.
    pub fn score(self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, candidate),
            Self::L2 => -l2_distance(query, candidate),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(RagError::ConfigError(format!("unknown distance metric '{other}'"))),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

#[derive(Deserialize)]
struct IndexFile {
    format: String,
    version: u32,
    metric: DistanceMetric,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format: &'a str,
    version: u32,
    metric: DistanceMetric,
    dimensions: usize,
    entries: &'a [IndexEntry],
}

/// A persistent collection of embedded chunks.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use docqa_rag::{DistanceMetric, HashingEmbeddingProvider, VectorIndex};
///
/// let index = VectorIndex::open_or_create(
///     "vectorstore/index.json",
///     Arc::new(HashingEmbeddingProvider::default()),
///     DistanceMetric::Cosine,
/// )
/// .await?;
/// index.insert(chunks).await?;
/// let hits = index.search("What color is the sky?", 3).await?;
/// ```
pub struct VectorIndex {
    path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    metric: DistanceMetric,
    dimensions: usize,
    entries: RwLock<Vec<IndexEntry>>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("path", &self.path)
            .field("provider", &self.provider.name())
            .field("metric", &self.metric)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Load the index stored at `path`, or start an empty one if nothing is there.
    ///
    /// Nothing is written until the first successful [`insert`](Self::insert).
    /// When a file exists its metric takes precedence over `metric`.
    ///
    /// # Errors
    ///
    /// - [`RagError::CorruptIndex`] if the file cannot be decoded, has an
    ///   unexpected format or version, or its dimensions disagree with the
    ///   embedding provider.
    /// - [`RagError::PersistenceError`] if the file exists but cannot be read.
    pub async fn open_or_create(
        path: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let path = path.into();
        let dimensions = provider.dimensions();

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), %dimensions, "creating new empty vector index");
                return Ok(Self { path, provider, metric, dimensions, entries: RwLock::default() });
            }
            Err(e) => {
                return Err(RagError::PersistenceError {
                    path,
                    message: format!("failed to read index: {e}"),
                });
            }
        };

        let file = decode_index(&path, &bytes, dimensions)?;
        if file.metric != metric {
            warn!(
                path = %path.display(),
                stored = ?file.metric,
                requested = ?metric,
                "persisted index keeps its stored distance metric"
            );
        }

        info!(path = %path.display(), entries = file.entries.len(), "loaded vector index");
        Ok(Self {
            path,
            provider,
            metric: file.metric,
            dimensions,
            entries: RwLock::new(file.entries),
        })
    }

    /// Embed `chunks`, append them and persist the whole index.
    ///
    /// Returns the number of chunks inserted. An empty input is a no-op.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingError`] if the provider fails or returns vectors
    ///   of the wrong shape; nothing is changed.
    /// - [`RagError::PersistenceError`] if writing fails; the in-memory index
    ///   is rolled back to its state before the call.
    pub async fn insert(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingError {
                provider: self.provider.name().to_string(),
                message: format!("expected {} vectors, got {}", chunks.len(), vectors.len()),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(RagError::EmbeddingError {
                provider: self.provider.name().to_string(),
                message: format!(
                    "vector has {} dimensions, index expects {}",
                    bad.len(),
                    self.dimensions
                ),
            });
        }

        let count = chunks.len();
        let mut entries = self.entries.write().await;
        let previous_len = entries.len();
        entries.extend(
            chunks.into_iter().zip(vectors).map(|(chunk, vector)| IndexEntry { chunk, vector }),
        );

        if let Err(e) = self.persist(&entries).await {
            entries.truncate(previous_len);
            error!(path = %self.path.display(), error = %e, "rolled back index insertion");
            return Err(e);
        }

        info!(path = %self.path.display(), inserted = count, total = entries.len(), "index updated");
        Ok(count)
    }

    /// Return at most `k` chunks closest to `query`, nearest first.
    ///
    /// Ties keep insertion order. Entries with blank text never match. An
    /// empty index returns an empty result without embedding the query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the query cannot be embedded.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 || self.entries.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(query).await?;
        if query_vector.len() != self.dimensions {
            return Err(RagError::EmbeddingError {
                provider: self.provider.name().to_string(),
                message: format!(
                    "query vector has {} dimensions, index expects {}",
                    query_vector.len(),
                    self.dimensions
                ),
            });
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.chunk.text.trim().is_empty())
            .map(|(i, entry)| (i, self.metric.score(&query_vector, &entry.vector)))
            .collect();

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        debug!(query_len = query.len(), k, hits = scored.len(), "index search");
        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: entries[i].chunk.clone(), score })
            .collect())
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the index holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Location of the serialized index.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The distance metric in use.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Dimensionality of stored vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Write the full index to a sibling temp file and rename it over `path`.
    async fn persist(&self, entries: &[IndexEntry]) -> Result<()> {
        let persistence_error = |message: String| RagError::PersistenceError {
            path: self.path.clone(),
            message,
        };

        let file = IndexFileRef {
            format: INDEX_FORMAT,
            version: INDEX_VERSION,
            metric: self.metric,
            dimensions: self.dimensions,
            entries,
        };
        let bytes = serde_json::to_vec(&file)
            .map_err(|e| persistence_error(format!("failed to serialize index: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_error(format!("failed to create directory: {e}")))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(persistence_error(format!("failed to write index: {e}")));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(persistence_error(format!("failed to replace index: {e}")));
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "index persisted");
        Ok(())
    }
}

fn decode_index(path: &Path, bytes: &[u8], dimensions: usize) -> Result<IndexFile> {
    let corrupt = |message: String| RagError::CorruptIndex { path: path.to_path_buf(), message };

    let file: IndexFile =
        serde_json::from_slice(bytes).map_err(|e| corrupt(format!("undecodable index: {e}")))?;

    if file.format != INDEX_FORMAT {
        return Err(corrupt(format!("unexpected format '{}'", file.format)));
    }
    if file.version != INDEX_VERSION {
        return Err(corrupt(format!(
            "unsupported version {} (expected {INDEX_VERSION})",
            file.version
        )));
    }
    if file.dimensions != dimensions {
        return Err(corrupt(format!(
            "index has {} dimensions but the embedding provider produces {dimensions}",
            file.dimensions
        )));
    }
    if let Some(entry) = file.entries.iter().find(|e| e.vector.len() != dimensions) {
        return Err(corrupt(format!(
            "entry '{}' has {} dimensions",
            entry.chunk.id,
            entry.vector.len()
        )));
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let score = DistanceMetric::Cosine.score(&[1.0, 2.0], &[2.0, 4.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(DistanceMetric::Cosine.score(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn l2_score_is_negated_distance() {
        let score = DistanceMetric::L2.score(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((score + 5.0).abs() < 1e-6);
    }

    #[test]
    fn metric_parses_from_config_strings() {
        assert_eq!("Cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("euclidean".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2);
        assert!("dot".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn decode_rejects_wrong_format_and_dimensions() {
        let path = Path::new("index.json");
        let wrong_format =
            br#"{"format":"faiss","version":1,"metric":"cosine","dimensions":2,"entries":[]}"#;
        assert!(matches!(
            decode_index(path, wrong_format, 2),
            Err(RagError::CorruptIndex { .. })
        ));

        let wrong_dims = br#"{"format":"docqa-vector-index","version":1,"metric":"cosine","dimensions":3,"entries":[]}"#;
        assert!(matches!(decode_index(path, wrong_dims, 2), Err(RagError::CorruptIndex { .. })));

        assert!(matches!(decode_index(path, b"not json", 2), Err(RagError::CorruptIndex { .. })));
    }
}
