//! Hybrid search combining vector and keyword search

use crate::embedding::{is_zero_vector, EmbeddingProvider};
use crate::index::{KeywordIndex, KeywordIndexError, VectorStore, VectorStoreError};
use crate::retrieval::{
    deduplicate_chunks, rank_order, reciprocal_rank_fusion, weighted_fusion, FusionError,
    FusionStrategy, RetrievalConfig, RetrievalResult, ScoredChunk, SearchType,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Vector search failed: {0}")]
    VectorSearchError(#[from] VectorStoreError),

    #[error("Keyword search failed: {0}")]
    KeywordSearchError(#[from] KeywordIndexError),

    #[error("Invalid fusion configuration: {0}")]
    FusionError(#[from] FusionError),
}

/// Hybrid retriever over a vector store and a keyword index
///
/// Both indexes are expected to hold the same corpus but are not kept in
/// lockstep; a chunk found by only one leg contributes only that leg's
/// component.
pub struct HybridRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    keyword_index: Arc<KeywordIndex>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Create a new hybrid retriever
    ///
    /// Fails when the embedder and store disagree on dimension.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        keyword_index: Arc<KeywordIndex>,
        config: RetrievalConfig,
    ) -> Result<Self, RetrievalError> {
        if embedder.dimension() != store.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: store.dimension(),
                actual: embedder.dimension(),
            }
            .into());
        }
        config.fusion_config()?;

        Ok(Self {
            embedder,
            store,
            keyword_index,
            config,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve the top `k` chunks for `query`
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        if k == 0 || query.trim().is_empty() {
            return Ok(RetrievalResult::default());
        }

        let limit = self.config.candidates_for(k);

        // Step 1: Vector + keyword candidates
        let query_vector = self.embedder.embed_query(query).await;
        let vector_results = if is_zero_vector(&query_vector) {
            warn!("Query embedding degraded; using keyword results only");
            Vec::new()
        } else {
            self.vector_search(&query_vector, limit)?
        };
        let keyword_results = self.keyword_index.search(query, limit)?;

        debug!(
            "Hybrid candidates: {} vector, {} keyword",
            vector_results.len(),
            keyword_results.len()
        );

        // Step 2: Fusion
        let fusion_config = self.config.fusion_config()?;
        let mut fused = match self.config.fusion {
            FusionStrategy::Weighted => {
                weighted_fusion(vector_results, keyword_results, &fusion_config)
            }
            FusionStrategy::Rrf => {
                reciprocal_rank_fusion(vector_results, keyword_results, &fusion_config)
            }
        };

        // Step 3: Apply score threshold
        if self.config.score_threshold > 0.0 {
            fused.retain(|c| c.score >= self.config.score_threshold);
        }

        // Step 4: Deduplicate, order, truncate
        fused.sort_by(|a, b| rank_order(a.score, a.id(), b.score, b.id()));
        let mut chunks = deduplicate_chunks(fused);
        chunks.truncate(k);

        Ok(RetrievalResult { chunks })
    }

    /// Vector leg, by plain similarity or MMR
    fn vector_search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let results = match self.config.search_type {
            SearchType::Similarity => self.store.similarity_search(query_vector, limit)?,
            SearchType::Mmr => self.store.max_marginal_relevance_search(
                query_vector,
                limit,
                self.config.mmr_fetch_k.max(limit),
                self.config.mmr_lambda,
            )?,
        };
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{Chunk, ChunkId, Metadata};
    use crate::index::{DistanceMetric, InMemoryVectorStore};
    use async_trait::async_trait;

    /// Embeds by keyword presence on fixed axes
    struct AxisEmbedder;

    const AXES: [&str; 3] = ["cat", "dog", "fish"];

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed_query(&self, text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            AXES.iter()
                .map(|a| if lower.contains(a) { 1.0 } else { 0.0 })
                .collect()
        }

        async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed_query(text).await);
            }
            out
        }

        fn dimension(&self) -> usize {
            AXES.len()
        }

        fn model_name(&self) -> &str {
            "axis"
        }
    }

    async fn retriever(config: RetrievalConfig) -> HybridRetriever {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(AxisEmbedder);
        let store = Arc::new(InMemoryVectorStore::new(3, DistanceMetric::Cosine));
        let keyword_index = Arc::new(KeywordIndex::in_memory().unwrap());

        let texts = [
            ("pets", 0, "My cat sleeps all day"),
            ("pets", 1, "A dog barks at night"),
            ("sea", 0, "Fish swim in the ocean"),
        ];
        let chunks: Vec<Chunk> = texts
            .iter()
            .map(|(doc, seq, text)| {
                Chunk::new(ChunkId::new(*doc, *seq), *text, 0..text.len(), Metadata::new())
            })
            .collect();
        let owned: Vec<String> = texts.iter().map(|(_, _, t)| t.to_string()).collect();
        let vectors = embedder.embed_batch(&owned).await;

        store.add(&chunks, &vectors).unwrap();
        keyword_index.index_documents(&chunks).unwrap();

        HybridRetriever::new(embedder, store, keyword_index, config).unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_top_match() {
        let retriever = retriever(RetrievalConfig::default()).await;
        let result = retriever.retrieve("where is the cat", 2).await.unwrap();

        assert!(result.len() <= 2);
        assert_eq!(result.chunks[0].id(), &ChunkId::new("pets", 0));
    }

    #[tokio::test]
    async fn test_zero_k_and_blank_query() {
        let retriever = retriever(RetrievalConfig::default()).await;
        assert!(retriever.retrieve("cat", 0).await.unwrap().is_empty());
        assert!(retriever.retrieve("  ", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_query_uses_keywords() {
        let retriever = retriever(RetrievalConfig::default()).await;
        // No axis word, so the query vector is all zeros
        let result = retriever.retrieve("ocean", 3).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.chunks[0].id(), &ChunkId::new("sea", 0));
    }

    #[tokio::test]
    async fn test_score_threshold() {
        let config = RetrievalConfig {
            score_threshold: 0.75,
            ..RetrievalConfig::default()
        };
        let retriever = retriever(config).await;
        let result = retriever.retrieve("cat", 3).await.unwrap();

        assert!(result.iter().all(|c| c.score >= 0.75));
        assert_eq!(result.ids(), vec![&ChunkId::new("pets", 0)]);
    }

    #[tokio::test]
    async fn test_results_are_unique() {
        let config = RetrievalConfig {
            fusion: FusionStrategy::Rrf,
            search_type: SearchType::Mmr,
            ..RetrievalConfig::default()
        };
        let retriever = retriever(config).await;
        let result = retriever.retrieve("cat dog", 3).await.unwrap();

        let mut ids = result.ids();
        ids.dedup();
        assert_eq!(ids.len(), result.len());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(AxisEmbedder);
        let store = Arc::new(InMemoryVectorStore::new(8, DistanceMetric::Cosine));
        let keyword_index = Arc::new(KeywordIndex::in_memory().unwrap());

        assert!(matches!(
            HybridRetriever::new(embedder, store, keyword_index, RetrievalConfig::default()),
            Err(RetrievalError::VectorSearchError(
                VectorStoreError::DimensionMismatch { .. }
            ))
        ));
    }
}
