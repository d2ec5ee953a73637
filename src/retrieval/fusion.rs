//! Score fusion for combining vector and keyword results

use crate::chunking::{Chunk, ChunkId};
use crate::retrieval::{deduplicate_chunks, rank_order, RetrievalSource, ScoredChunk};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be non-negative and not both zero")]
    InvalidWeights,

    #[error("Invalid RRF constant: {0}")]
    InvalidRrfK(f32),
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f32,

    /// Weight for vector results
    pub vector_weight: f32,

    /// Weight for keyword results
    pub keyword_weight: f32,
}

impl FusionConfig {
    pub fn new(rrf_k: f32, vector_weight: f32, keyword_weight: f32) -> Result<Self, FusionError> {
        let valid = |w: f32| w.is_finite() && w >= 0.0;
        if !valid(vector_weight) || !valid(keyword_weight) {
            return Err(FusionError::InvalidWeights);
        }
        if vector_weight == 0.0 && keyword_weight == 0.0 {
            return Err(FusionError::InvalidWeights);
        }
        if !rrf_k.is_finite() || rrf_k < 0.0 {
            return Err(FusionError::InvalidRrfK(rrf_k));
        }

        Ok(Self {
            rrf_k,
            vector_weight,
            keyword_weight,
        })
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            vector_weight: 0.5,
            keyword_weight: 0.5,
        }
    }
}

/// Min-max normalize scores into [0, 1]
///
/// A single score, or a set with zero range, normalizes to 1.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let (min, max) = scores
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    let range = max - min;

    scores
        .iter()
        .map(|&s| {
            if range > 0.0 && range.is_finite() {
                (s - min) / range
            } else {
                1.0
            }
        })
        .collect()
}

/// Per-chunk accumulator; missing components stay 0
#[derive(Default)]
struct Fused {
    chunk: Option<Chunk>,
    score: f32,
}

fn accumulate(
    fused: &mut BTreeMap<ChunkId, Fused>,
    results: Vec<ScoredChunk>,
    contribution: impl Fn(usize, f32) -> f32,
) {
    // First occurrence of a chunk within a leg is its best
    let results = deduplicate_chunks(results);

    let normalized = min_max_normalize(&results.iter().map(|r| r.score).collect::<Vec<_>>());

    for (rank, (result, norm)) in results.into_iter().zip(normalized).enumerate() {
        let entry = fused.entry(result.id().clone()).or_default();
        entry.score += contribution(rank, norm);
        if entry.chunk.is_none() {
            entry.chunk = Some(result.chunk);
        }
    }
}

fn into_ranked(fused: BTreeMap<ChunkId, Fused>) -> Vec<ScoredChunk> {
    let mut results: Vec<ScoredChunk> = fused
        .into_values()
        .filter_map(|f| {
            f.chunk
                .map(|chunk| ScoredChunk::new(chunk, f.score, RetrievalSource::Fused))
        })
        .collect();

    results.sort_by(|a, b| rank_order(a.score, a.id(), b.score, b.id()));
    results
}

/// Weighted fusion of min-max normalized scores
///
/// fused = vector_weight * norm_vector + keyword_weight * norm_keyword,
/// each leg normalized within its own candidate set. Sorted by fused score
/// descending, ties by chunk id ascending.
pub fn weighted_fusion(
    vector_results: Vec<ScoredChunk>,
    keyword_results: Vec<ScoredChunk>,
    config: &FusionConfig,
) -> Vec<ScoredChunk> {
    let mut fused = BTreeMap::new();
    accumulate(&mut fused, vector_results, |_, norm| {
        config.vector_weight * norm
    });
    accumulate(&mut fused, keyword_results, |_, norm| {
        config.keyword_weight * norm
    });
    into_ranked(fused)
}

/// Apply Reciprocal Rank Fusion to combine two ranked lists
///
/// RRF formula: score(id) = sum over all rankings of: weight / (k + rank)
///
/// # Arguments
/// * `vector_results` - ranked results from vector search
/// * `keyword_results` - ranked results from keyword search
/// * `config` - Fusion configuration
///
/// # Returns
/// Fused results sorted by score descending
pub fn reciprocal_rank_fusion(
    vector_results: Vec<ScoredChunk>,
    keyword_results: Vec<ScoredChunk>,
    config: &FusionConfig,
) -> Vec<ScoredChunk> {
    let mut fused = BTreeMap::new();
    accumulate(&mut fused, vector_results, |rank, _| {
        config.vector_weight / (config.rrf_k + (rank as f32) + 1.0)
    });
    accumulate(&mut fused, keyword_results, |rank, _| {
        config.keyword_weight / (config.rrf_k + (rank as f32) + 1.0)
    });
    into_ranked(fused)
}
