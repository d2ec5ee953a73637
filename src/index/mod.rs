//! Vector store and keyword index
//!
//! Both indexes hold the same chunk corpus. Writes are mutually exclusive
//! with reads on one instance (interior `RwLock`); nothing coordinates the
//! two indexes, so callers must tolerate them diverging briefly.

mod hnsw;
mod keyword;
mod memory;
mod mmr;

pub use hnsw::HnswVectorStore;
pub use keyword::{KeywordIndex, KeywordIndexError};
pub use memory::InMemoryVectorStore;
pub use mmr::{cosine_similarity, select_mmr};

use crate::chunking::Chunk;
use crate::retrieval::ScoredChunk;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorStoreError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Distance metric, fixed at store construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    L2,
    InnerProduct,
}

impl DistanceMetric {
    /// Raw metric value between two vectors
    ///
    /// Cosine similarity, Euclidean distance, or dot product.
    pub fn raw(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        }
    }

    /// Monotonic relevance score derived from a raw value (higher is closer)
    pub fn relevance(self, raw: f32) -> f32 {
        match self {
            DistanceMetric::L2 => 1.0 / (1.0 + raw),
            DistanceMetric::Cosine | DistanceMetric::InnerProduct => raw,
        }
    }
}

/// Nearest-neighbor store of (chunk, vector) pairs
///
/// All vectors share one dimension. Re-adding a chunk id replaces the
/// previous entry.
pub trait VectorStore: Send + Sync {
    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    /// Store parallel sequences of chunks and vectors
    fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), VectorStoreError>;

    /// Remove every chunk of a document, returning how many were removed
    fn delete_by_document(&self, document_id: &str) -> Result<usize, VectorStoreError>;

    /// Up to `k` chunks by descending relevance score
    fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Same order as `similarity_search`, but scores are the raw metric
    /// (for L2 a distance, lower is closer)
    fn similarity_search_with_score(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Diversity-aware selection of `k` out of the `fetch_k` nearest
    fn max_marginal_relevance_search(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), VectorStoreError> {
    if vector.len() != expected {
        return Err(VectorStoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Validate an `add` call before any entry is written
pub(crate) fn check_add(
    dimension: usize,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<(), VectorStoreError> {
    if chunks.len() != vectors.len() {
        return Err(VectorStoreError::LengthMismatch {
            chunks: chunks.len(),
            vectors: vectors.len(),
        });
    }
    vectors
        .iter()
        .try_for_each(|vector| check_dimension(dimension, vector))
}

pub(crate) fn check_lambda(lambda: f32) -> Result<(), VectorStoreError> {
    if !(0.0..=1.0).contains(&lambda) {
        return Err(VectorStoreError::InvalidArgument(format!(
            "lambda must be within [0, 1], got {}",
            lambda
        )));
    }
    Ok(())
}

/// Construct the backend named in configuration
pub fn build_vector_store(config: &StoreConfig, dimension: usize) -> Box<dyn VectorStore> {
    match config.backend {
        StoreBackend::Memory => Box::new(InMemoryVectorStore::new(dimension, config.metric)),
        StoreBackend::Hnsw => Box::new(HnswVectorStore::new(
            dimension,
            config.metric,
            config.hnsw_m,
            config.hnsw_ef_construction,
            config.hnsw_ef_search,
            config.hnsw_capacity,
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Exact brute-force search
    Memory,
    /// Approximate candidates from an HNSW graph, rescored exactly
    Hnsw,
}

/// Configuration for the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub metric: DistanceMetric,
    /// HNSW M parameter (number of connections per layer)
    pub hnsw_m: usize,
    /// HNSW construction parameter (higher = better recall, slower build)
    pub hnsw_ef_construction: usize,
    /// HNSW search parameter (higher = better recall, slower search)
    pub hnsw_ef_search: usize,
    /// Expected number of vectors (graph sizing hint)
    pub hnsw_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            metric: DistanceMetric::Cosine,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            hnsw_capacity: 10_000,
        }
    }
}
