/// HNSW-backed approximate vector store
use super::memory::{mmr_over, rank_entries, Entry};
use super::{check_add, check_dimension, check_lambda, DistanceMetric, VectorStore, VectorStoreError};
use crate::chunking::{Chunk, ChunkId};
use crate::retrieval::{RetrievalSource, ScoredChunk};
use hnsw_rs::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Maximum number of graph layers accepted by hnsw_rs
const MAX_LAYERS: usize = 16;

struct Inner {
    /// Candidate generator; points are never removed from it
    graph: Hnsw<'static, f32, DistL2>,
    /// Points inserted into the current graph
    graph_len: usize,
    /// Point id -> live entry
    live: HashMap<usize, Entry>,
    /// Live points kept out of the graph, always scored exactly
    unindexed: BTreeSet<usize>,
    /// Chunk id -> point id of its current entry
    by_chunk: BTreeMap<ChunkId, usize>,
    /// Points still in the graph whose entry was deleted or replaced
    tombstones: usize,
    next_id: usize,
}

/// Vector store using an HNSW graph for candidate generation
///
/// The graph always runs on L2. For cosine the stored graph points are
/// unit-normalized so L2 order matches cosine order; zero-norm vectors
/// (embedding fallbacks) have no direction and stay out of the graph.
/// Inner product has no L2-equivalent ordering for unnormalized vectors,
/// so that metric is served by an exact scan and the graph stays empty.
///
/// Candidates are rescored exactly with the configured metric, so scores
/// are identical to the in-memory store; only recall is approximate.
///
/// Deleted and replaced entries become tombstones. Once tombstones
/// outnumber live entries the graph is rebuilt from the live set.
pub struct HnswVectorStore {
    dimension: usize,
    metric: DistanceMetric,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    capacity: usize,
    inner: RwLock<Inner>,
}

impl HnswVectorStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `m` - HNSW M parameter (number of connections per layer)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `ef_search` - HNSW search parameter (higher = better recall, slower search)
    /// * `capacity` - Expected number of vectors
    pub fn new(
        dimension: usize,
        metric: DistanceMetric,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
        capacity: usize,
    ) -> Self {
        let m = m.max(2);
        let ef_construction = ef_construction.max(m);
        let capacity = capacity.max(1);

        Self {
            dimension,
            metric,
            m,
            ef_construction,
            ef_search: ef_search.max(1),
            capacity,
            inner: RwLock::new(Inner {
                graph: Self::new_graph(m, capacity, ef_construction),
                graph_len: 0,
                live: HashMap::new(),
                unindexed: BTreeSet::new(),
                by_chunk: BTreeMap::new(),
                tombstones: 0,
                next_id: 0,
            }),
        }
    }

    fn new_graph(m: usize, capacity: usize, ef_construction: usize) -> Hnsw<'static, f32, DistL2> {
        Hnsw::<f32, DistL2>::new(m, capacity, MAX_LAYERS, ef_construction, DistL2 {})
    }

    /// Vector as inserted into (or searched in) the graph
    ///
    /// `None` when the graph cannot order this vector under the metric.
    fn graph_point(&self, vector: &[f32]) -> Option<Vec<f32>> {
        match self.metric {
            DistanceMetric::Cosine => {
                let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                (norm > 0.0).then(|| vector.iter().map(|x| x / norm).collect())
            }
            DistanceMetric::L2 => Some(vector.to_vec()),
            DistanceMetric::InnerProduct => None,
        }
    }

    /// Number of deleted or replaced points still held by the graph
    pub fn tombstones(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tombstones
    }

    fn insert_point(&self, inner: &mut Inner, entry: Entry) {
        let point_id = inner.next_id;
        inner.next_id += 1;

        match self.graph_point(&entry.vector) {
            Some(point) => {
                inner.graph.insert((point.as_slice(), point_id));
                inner.graph_len += 1;
            }
            None => {
                inner.unindexed.insert(point_id);
            }
        }

        if let Some(previous) = inner.by_chunk.insert(entry.chunk.id().clone(), point_id) {
            Self::retire_point(inner, previous);
        }
        inner.live.insert(point_id, entry);
    }

    /// Drop a point's entry; graph points leave a tombstone behind
    fn retire_point(inner: &mut Inner, point_id: usize) {
        inner.live.remove(&point_id);
        if !inner.unindexed.remove(&point_id) {
            inner.tombstones += 1;
        }
    }

    /// Rebuild the graph from live entries when tombstones dominate
    fn maybe_rebuild(&self, inner: &mut Inner) {
        if inner.tombstones <= inner.live.len() {
            return;
        }

        debug!(
            "Rebuilding HNSW graph: {} live, {} tombstones",
            inner.live.len(),
            inner.tombstones
        );

        let mut entries: Vec<Entry> = std::mem::take(&mut inner.live).into_values().collect();
        entries.sort_by(|a, b| a.chunk.id().cmp(b.chunk.id()));

        inner.graph = Self::new_graph(
            self.m,
            self.capacity.max(entries.len()),
            self.ef_construction,
        );
        inner.graph_len = 0;
        inner.unindexed.clear();
        inner.by_chunk.clear();
        inner.tombstones = 0;
        inner.next_id = 0;

        for entry in entries {
            self.insert_point(inner, entry);
        }
    }

    /// Live entries near `query`, exactly rescored, best `limit` kept
    fn candidates<'a>(&self, inner: &'a Inner, query: &[f32], limit: usize) -> Vec<(f32, &'a Entry)> {
        if inner.live.is_empty() || limit == 0 {
            return Vec::new();
        }

        let point = match self.graph_point(query) {
            Some(point) if inner.graph_len > 0 => point,
            _ => return rank_entries(inner.live.values(), self.metric, query, limit),
        };

        // Over-fetch to absorb tombstones and exact-rescoring reorders
        let knbn = (limit.max(self.ef_search) + inner.tombstones).min(inner.graph_len);
        let ef = self.ef_search.max(knbn);

        let neighbours = inner.graph.search(&point, knbn, ef);
        let found = neighbours
            .iter()
            .filter_map(|n| inner.live.get(&n.d_id))
            .chain(inner.unindexed.iter().filter_map(|id| inner.live.get(id)));

        rank_entries(found, self.metric, query, limit)
    }
}

impl VectorStore for HnswVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), VectorStoreError> {
        check_add(self.dimension, chunks, vectors)?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            self.insert_point(
                &mut inner,
                Entry {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                },
            );
        }
        self.maybe_rebuild(&mut inner);

        Ok(())
    }

    fn delete_by_document(&self, document_id: &str) -> Result<usize, VectorStoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let doomed: Vec<ChunkId> = inner
            .by_chunk
            .keys()
            .filter(|id| id.document_id == document_id)
            .cloned()
            .collect();

        for id in &doomed {
            if let Some(point_id) = inner.by_chunk.remove(id) {
                Self::retire_point(&mut inner, point_id);
            }
        }
        self.maybe_rebuild(&mut inner);

        Ok(doomed.len())
    }

    fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        check_dimension(self.dimension, query)?;

        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .candidates(&inner, query, k)
            .into_iter()
            .map(|(raw, entry)| {
                ScoredChunk::new(
                    entry.chunk.clone(),
                    self.metric.relevance(raw),
                    RetrievalSource::Vector,
                )
            })
            .collect())
    }

    fn similarity_search_with_score(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        check_dimension(self.dimension, query)?;

        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .candidates(&inner, query, k)
            .into_iter()
            .map(|(raw, entry)| ScoredChunk::new(entry.chunk.clone(), raw, RetrievalSource::Vector))
            .collect())
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

        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let candidates = self.candidates(&inner, query, fetch_k);
        Ok(mmr_over(&candidates, self.metric, k, lambda))
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Metadata;
    use crate::index::InMemoryVectorStore;

    fn store(metric: DistanceMetric) -> HnswVectorStore {
        HnswVectorStore::new(4, metric, 16, 200, 64, 100)
    }

    fn chunk(doc: &str, seq: usize) -> Chunk {
        let text = format!("{} chunk {}", doc, seq);
        let len = text.len();
        Chunk::new(ChunkId::new(doc, seq), text, 0..len, Metadata::new())
    }

    fn axis(i: usize, scale: f32) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[i % 4] = scale;
        v
    }

    #[test]
    fn test_insert_and_search() {
        let store = store(DistanceMetric::Cosine);
        store
            .add(
                &[chunk("a", 0), chunk("b", 0), chunk("c", 0)],
                &[axis(0, 1.0), axis(1, 1.0), vec![0.9, 0.1, 0.0, 0.0]],
            )
            .unwrap();

        assert_eq!(store.len(), 3);

        let results = store.similarity_search(&axis(0, 2.0), 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id(), &ChunkId::new("a", 0));
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].id(), &ChunkId::new("c", 0));
    }

    #[test]
    fn test_empty_search() {
        let store = store(DistanceMetric::L2);
        assert!(store.similarity_search(&axis(0, 1.0), 3).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_validation() {
        let store = store(DistanceMetric::Cosine);
        assert!(store.add(&[chunk("a", 0)], &[vec![1.0; 3]]).is_err());
        assert!(store.similarity_search(&[1.0; 5], 1).is_err());
    }

    #[test]
    fn test_replace_and_delete_use_tombstones() {
        let store = store(DistanceMetric::L2);
        let chunks: Vec<Chunk> = (0..4).map(|i| chunk("a", i)).collect();
        let vectors: Vec<Vec<f32>> = (0..4).map(|i| axis(i, 1.0)).collect();
        store.add(&chunks, &vectors).unwrap();
        store.add(&[chunk("b", 0)], &[axis(0, 3.0)]).unwrap();

        // Replacement keeps one live entry per chunk id
        store.add(&[chunk("a", 0)], &[axis(0, 5.0)]).unwrap();
        assert_eq!(store.len(), 5);
        assert_eq!(store.tombstones(), 1);

        let top = store.similarity_search(&axis(0, 5.0), 1).unwrap();
        assert_eq!(top[0].id(), &ChunkId::new("a", 0));
        assert_eq!(top[0].score, 1.0);

        assert_eq!(store.delete_by_document("a").unwrap(), 4);
        assert_eq!(store.len(), 1);
        // Five tombstones against one live entry trigger a rebuild
        assert_eq!(store.tombstones(), 0);

        let rest = store.similarity_search(&axis(0, 1.0), 10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id(), &ChunkId::new("b", 0));
    }

    #[test]
    fn test_mmr() {
        let store = store(DistanceMetric::Cosine);
        store
            .add(
                &[chunk("a", 0), chunk("a", 1), chunk("b", 0)],
                &[
                    vec![1.0, 0.0, 0.0, 0.0],
                    vec![0.9, 0.1, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0, 0.0],
                ],
            )
            .unwrap();

        let results = store
            .max_marginal_relevance_search(&[1.0, 0.2, 0.0, 0.0], 2, 3, 0.3)
            .unwrap();
        assert_eq!(results[0].id(), &ChunkId::new("a", 1));
        assert_eq!(results[1].id(), &ChunkId::new("b", 0));
    }

    fn ids(results: &[ScoredChunk]) -> Vec<ChunkId> {
        results.iter().map(|r| r.id().clone()).collect()
    }

    #[test]
    fn test_inner_product_ranks_by_dot_product() {
        let store = store(DistanceMetric::InnerProduct);
        store
            .add(
                &[chunk("near", 0), chunk("big", 0)],
                &[axis(0, 1.0), axis(0, 10.0)],
            )
            .unwrap();

        let top = store.similarity_search(&axis(0, 1.0), 1).unwrap();
        assert_eq!(top[0].id(), &ChunkId::new("big", 0));
        assert_eq!(top[0].score, 10.0);
    }

    #[test]
    fn test_zero_vectors_do_not_displace_real_matches() {
        let store = store(DistanceMetric::Cosine);
        store
            .add(
                &[chunk("weak", 0), chunk("degraded", 0)],
                &[vec![0.3, 0.954, 0.0, 0.0], vec![0.0; 4]],
            )
            .unwrap();

        let top = store.similarity_search(&axis(0, 1.0), 1).unwrap();
        assert_eq!(top[0].id(), &ChunkId::new("weak", 0));
        assert!((top[0].score - 0.3).abs() < 1e-3);

        // Zero vectors never enter the graph, so replacing one leaves no tombstone
        store.add(&[chunk("degraded", 0)], &[axis(1, 1.0)]).unwrap();
        assert_eq!(store.tombstones(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_matches_exact_store_for_every_metric() {
        let chunks: Vec<Chunk> = (0..8).map(|i| chunk("doc", i)).collect();
        let vectors = vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![10.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.3, 0.954, 0.0, 0.0],
            vec![-1.0, 0.5, 0.0, 0.0],
            vec![0.0, 0.0, 2.0, 2.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.5, 0.5, 0.5, 0.5],
        ];
        let queries = [
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, -1.0],
            vec![-2.0, 1.0, 3.0, 0.5],
        ];

        for metric in [
            DistanceMetric::Cosine,
            DistanceMetric::L2,
            DistanceMetric::InnerProduct,
        ] {
            let approximate = store(metric);
            let exact = InMemoryVectorStore::new(4, metric);
            approximate.add(&chunks, &vectors).unwrap();
            exact.add(&chunks, &vectors).unwrap();

            for query in &queries {
                for k in [1, 3, 8] {
                    assert_eq!(
                        ids(&approximate.similarity_search(query, k).unwrap()),
                        ids(&exact.similarity_search(query, k).unwrap()),
                        "{:?} query {:?} k {}",
                        metric,
                        query,
                        k
                    );
                }
            }
        }
    }
}
