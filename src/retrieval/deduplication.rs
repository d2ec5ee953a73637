//! Result deduplication by chunk ID

use crate::chunking::ChunkId;
use crate::retrieval::ScoredChunk;
use std::collections::HashSet;

/// Deduplicate chunks by chunk id, keeping the first instance
///
/// # Arguments
/// * `chunks` - Scored chunks potentially with duplicates, best first
///
/// # Returns
/// Deduplicated chunks, maintaining input order
pub fn deduplicate_chunks(chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut seen: HashSet<ChunkId> = HashSet::new();

    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.id().clone()))
        .collect()
}
