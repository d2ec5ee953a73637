//! Hybrid retrieval
//!
//! Combines vector search and BM25 keyword search over the same chunk
//! corpus, fusing min-max normalized scores (or reciprocal ranks) into a
//! single deduplicated ranking.

mod deduplication;
mod fusion;
mod hybrid;
mod scored;

pub use deduplication::deduplicate_chunks;
pub use fusion::{
    min_max_normalize, reciprocal_rank_fusion, weighted_fusion, FusionConfig, FusionError,
};
pub use hybrid::{HybridRetriever, RetrievalError};
pub use scored::{rank_order, RetrievalResult, RetrievalSource, ScoredChunk};

use serde::{Deserialize, Serialize};

/// How vector and keyword candidates are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Weighted sum of per-leg min-max normalized scores
    Weighted,
    /// Reciprocal rank fusion
    Rrf,
}

/// How the vector leg selects candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Similarity,
    Mmr,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not specify k
    pub top_k: usize,
    /// Each leg requests `k * candidate_multiplier` candidates
    pub candidate_multiplier: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub fusion: FusionStrategy,
    /// RRF K constant (typically 60)
    pub rrf_k: f32,
    pub search_type: SearchType,
    /// Candidates considered by MMR before diversity selection
    pub mmr_fetch_k: usize,
    /// 1.0 = pure relevance, 0.0 = pure diversity
    pub mmr_lambda: f32,
    /// Fused results scoring below this are dropped
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            candidate_multiplier: 2,
            vector_weight: 0.5,
            keyword_weight: 0.5,
            fusion: FusionStrategy::Weighted,
            rrf_k: 60.0,
            search_type: SearchType::Similarity,
            mmr_fetch_k: 20,
            mmr_lambda: 0.5,
            score_threshold: 0.0,
        }
    }
}

impl RetrievalConfig {
    /// Candidates requested from each leg for a final top-`k`
    pub fn candidates_for(&self, k: usize) -> usize {
        k.saturating_mul(self.candidate_multiplier.max(1))
    }

    pub fn fusion_config(&self) -> Result<FusionConfig, FusionError> {
        FusionConfig::new(self.rrf_k, self.vector_weight, self.keyword_weight)
    }

    /// Highest fused score the configured strategy can produce
    ///
    /// Reached by a chunk ranked first (or normalized to 1.0) in both legs.
    pub fn max_fused_score(&self) -> f32 {
        let weights = self.vector_weight + self.keyword_weight;
        match self.fusion {
            FusionStrategy::Weighted => weights,
            FusionStrategy::Rrf => weights / (self.rrf_k + 1.0),
        }
    }
}
