/// Exact in-memory vector store
use super::mmr::{by_relevance, select_mmr};
use super::{check_add, check_dimension, check_lambda, DistanceMetric, VectorStore, VectorStoreError};
use crate::chunking::{Chunk, ChunkId};
use crate::retrieval::{RetrievalSource, ScoredChunk};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// A stored (chunk, vector) pair
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Score every entry against `query`, keeping the `limit` most relevant
///
/// Returns `(raw, entry)` pairs ordered by descending relevance, ties by
/// ascending chunk id.
pub(crate) fn rank_entries<'a, I>(
    entries: I,
    metric: DistanceMetric,
    query: &[f32],
    limit: usize,
) -> Vec<(f32, &'a Entry)>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let mut scored: Vec<(f32, &Entry)> = entries
        .into_iter()
        .map(|entry| (metric.raw(query, &entry.vector), entry))
        .collect();

    scored.sort_by(|a, b| {
        by_relevance(
            (metric.relevance(a.0), a.1.chunk.id()),
            (metric.relevance(b.0), b.1.chunk.id()),
        )
    });
    scored.truncate(limit);
    scored
}

/// Run MMR over ranked candidates, reporting relevance scores
pub(crate) fn mmr_over(
    candidates: &[(f32, &Entry)],
    metric: DistanceMetric,
    k: usize,
    lambda: f32,
) -> Vec<ScoredChunk> {
    let ids: Vec<&ChunkId> = candidates.iter().map(|(_, e)| e.chunk.id()).collect();
    let vectors: Vec<&[f32]> = candidates.iter().map(|(_, e)| e.vector.as_slice()).collect();
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|(raw, _)| metric.relevance(*raw))
        .collect();

    select_mmr(&ids, &vectors, &relevance, k, lambda)
        .into_iter()
        .map(|i| {
            ScoredChunk::new(
                candidates[i].1.chunk.clone(),
                relevance[i],
                RetrievalSource::Vector,
            )
        })
        .collect()
}

/// Brute-force vector store keyed by chunk id
///
/// Exact search over every stored vector; suitable for corpora that fit
/// in memory. Deterministic for a fixed corpus and query.
pub struct InMemoryVectorStore {
    dimension: usize,
    metric: DistanceMetric,
    entries: RwLock<BTreeMap<ChunkId, Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Look up a stored vector
    pub fn vector(&self, id: &ChunkId) -> Option<Vec<f32>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).map(|e| e.vector.clone())
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        raw_scores: bool,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        check_dimension(self.dimension, query)?;

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let ranked = rank_entries(entries.values(), self.metric, query, k);

        Ok(ranked
            .into_iter()
            .map(|(raw, entry)| {
                let score = if raw_scores {
                    raw
                } else {
                    self.metric.relevance(raw)
                };
                ScoredChunk::new(entry.chunk.clone(), score, RetrievalSource::Vector)
            })
            .collect())
    }
}

impl VectorStore for InMemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), VectorStoreError> {
        check_add(self.dimension, chunks, vectors)?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            entries.insert(
                chunk.id().clone(),
                Entry {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                },
            );
        }

        Ok(())
    }

    fn delete_by_document(&self, document_id: &str) -> Result<usize, VectorStoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|id, _| id.document_id != document_id);
        Ok(before - entries.len())
    }

    fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        self.search(query, k, false)
    }

    fn similarity_search_with_score(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        self.search(query, k, true)
    }

    fn max_marginal_relevance_search(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        check_dimension(self.dimension, query)?;
        check_lambda(lambda)?;

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let candidates = rank_entries(entries.values(), self.metric, query, fetch_k);
        Ok(mmr_over(&candidates, self.metric, k, lambda))
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Metadata;

    fn chunk(doc: &str, seq: usize, text: &str) -> Chunk {
        Chunk::new(ChunkId::new(doc, seq), text, 0..text.len(), Metadata::new())
    }

    fn populated(metric: DistanceMetric) -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new(3, metric);
        let chunks = vec![
            chunk("a", 0, "x axis"),
            chunk("a", 1, "mostly x"),
            chunk("b", 0, "y axis"),
        ];
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
        ];
        store.add(&chunks, &vectors).unwrap();
        store
    }

    #[test]
    fn test_empty_store() {
        let store = InMemoryVectorStore::new(3, DistanceMetric::Cosine);
        assert!(store.is_empty());
        assert!(store.similarity_search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_similarity_search_sorted() {
        let store = populated(DistanceMetric::Cosine);
        let results = store.similarity_search(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id(), &ChunkId::new("a", 0));
        assert_eq!(results[1].id(), &ChunkId::new("a", 1));
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_raw_l2_scores() {
        let store = populated(DistanceMetric::L2);
        let results = store
            .similarity_search_with_score(&[0.0, 1.0, 0.0], 3)
            .unwrap();

        // Raw L2: nearest first, distances ascending
        assert_eq!(results[0].id(), &ChunkId::new("b", 0));
        assert_eq!(results[0].score, 0.0);
        assert!(results[1].score <= results[2].score);

        let normalized = store.similarity_search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(normalized[0].score, 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let store = InMemoryVectorStore::new(3, DistanceMetric::Cosine);
        let err = store
            .add(&[chunk("a", 0, "t")], &[vec![1.0, 0.0]])
            .unwrap_err();
        assert_eq!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let store = InMemoryVectorStore::new(3, DistanceMetric::Cosine);
        assert!(matches!(
            store.add(&[chunk("a", 0, "t")], &[]),
            Err(VectorStoreError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_readd_replaces() {
        let store = populated(DistanceMetric::Cosine);
        store
            .add(&[chunk("a", 0, "replaced")], &[vec![0.0, 0.0, 1.0]])
            .unwrap();

        assert_eq!(store.len(), 3);
        let top = store.similarity_search(&[0.0, 0.0, 1.0], 1).unwrap();
        assert_eq!(top[0].text(), "replaced");
    }

    #[test]
    fn test_delete_by_document() {
        let store = populated(DistanceMetric::Cosine);
        assert_eq!(store.delete_by_document("a").unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.delete_by_document("missing").unwrap(), 0);
    }

    #[test]
    fn test_mmr_lambda_one_matches_similarity() {
        let store = populated(DistanceMetric::Cosine);
        let query = [1.0, 0.2, 0.0];

        let plain = store.similarity_search(&query, 3).unwrap();
        let mmr = store
            .max_marginal_relevance_search(&query, 3, 3, 1.0)
            .unwrap();

        let plain_ids: Vec<_> = plain.iter().map(|c| c.id().clone()).collect();
        let mmr_ids: Vec<_> = mmr.iter().map(|c| c.id().clone()).collect();
        assert_eq!(plain_ids, mmr_ids);
    }

    #[test]
    fn test_mmr_prefers_diversity() {
        let store = populated(DistanceMetric::Cosine);
        let results = store
            .max_marginal_relevance_search(&[1.0, 0.2, 0.0], 2, 3, 0.3)
            .unwrap();

        assert_eq!(results[0].id(), &ChunkId::new("a", 1));
        assert_eq!(results[1].id(), &ChunkId::new("b", 0));
    }

    #[test]
    fn test_mmr_invalid_lambda() {
        let store = populated(DistanceMetric::Cosine);
        assert!(store
            .max_marginal_relevance_search(&[1.0, 0.0, 0.0], 2, 3, 2.0)
            .is_err());
    }
}
