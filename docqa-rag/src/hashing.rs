//! Offline embedding provider based on feature hashing.
//!
//! Each lowercase word token and each character trigram of a token is hashed
//! with 64-bit FNV-1a into one of `dimensions` buckets with a hash-derived
//! sign. The bucket counts are L2-normalised, so cosine similarity measures
//! lexical overlap. The hash is fixed, which keeps vectors bit-for-bit stable
//! across processes and platforms.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Weight of a whole-word feature relative to a trigram feature.
const WORD_WEIGHT: f32 = 2.0;

fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    bytes.iter().fold(FNV_OFFSET ^ seed, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// A deterministic, dependency-free [`EmbeddingProvider`].
///
/// Needs neither an API key nor a model download, so tests and air-gapped
/// runs use it. It matches shared words, not meaning.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Default dimensionality, matching common small sentence-embedding models.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create a provider producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError("embedding dimensions must be non-zero".into()));
        }
        Ok(Self { dimensions })
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature, 0);
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if fnv1a(feature, 0x9e37_79b9) & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            self.add_feature(&mut vector, token.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> =
                std::iter::once('^').chain(token.chars()).chain(std::iter::once('$')).collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, trigram.as_bytes(), 1.0);
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: Self::DEFAULT_DIMENSIONS }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
