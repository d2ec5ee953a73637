//! Scored chunk and retrieval result structures

use crate::chunking::{Chunk, ChunkId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which retriever produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Vector,
    Keyword,
    Fused,
}

/// A chunk with a retrieval score (higher is more relevant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: Chunk,

    /// Retrieval score
    pub score: f32,

    /// Retriever that produced the score
    pub source: RetrievalSource,
}

impl ScoredChunk {
    /// Create a new scored chunk
    pub fn new(chunk: Chunk, score: f32, source: RetrievalSource) -> Self {
        Self {
            chunk,
            score,
            source,
        }
    }

    pub fn id(&self) -> &ChunkId {
        self.chunk.id()
    }

    pub fn text(&self) -> &str {
        self.chunk.text()
    }
}

/// Descending score, then ascending chunk id
///
/// NaN scores sort last.
pub fn rank_order(a_score: f32, a_id: &ChunkId, b_score: f32, b_id: &ChunkId) -> Ordering {
    match (a_score.is_nan(), b_score.is_nan()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_id.cmp(b_id))
}

/// Ordered, deduplicated retrieval output (at most the requested top-k)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.chunks.iter()
    }

    pub fn ids(&self) -> Vec<&ChunkId> {
        self.chunks.iter().map(ScoredChunk::id).collect()
    }

    /// Join chunk texts for prompt assembly by a generation layer
    pub fn context(&self, separator: &str) -> String {
        self.chunks
            .iter()
            .map(ScoredChunk::text)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredChunk;
    type IntoIter = std::vec::IntoIter<ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_order() {
        let a = ChunkId::new("a", 0);
        let b = ChunkId::new("b", 0);

        assert_eq!(rank_order(0.9, &b, 0.5, &a), Ordering::Less);
        assert_eq!(rank_order(0.5, &b, 0.5, &a), Ordering::Greater);
        assert_eq!(rank_order(f32::NAN, &a, 0.1, &b), Ordering::Greater);
    }
}
