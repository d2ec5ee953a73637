//! Maximal marginal relevance selection

use crate::chunking::ChunkId;
use crate::retrieval::rank_order;
use std::cmp::Ordering;

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Greedy MMR over pre-fetched candidates
///
/// Each step picks the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`,
/// preferring the lower chunk id on exact ties. Redundancy is measured as
/// cosine similarity between candidate vectors. Returns candidate indices
/// in selection order.
pub fn select_mmr(
    ids: &[&ChunkId],
    vectors: &[&[f32]],
    relevance: &[f32],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(ids.len()));
    // Highest similarity of each candidate to anything already selected
    let mut redundancy: Vec<f32> = vec![f32::NEG_INFINITY; ids.len()];
    let mut remaining: Vec<usize> = (0..ids.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let score = |i: usize| {
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[i] };
            lambda * relevance[i] - (1.0 - lambda) * penalty
        };

        let best_pos = remaining
            .iter()
            .enumerate()
            .min_by(|&(_, &a), &(_, &b)| rank_order(score(a), ids[a], score(b), ids[b]))
            .map(|(pos, _)| pos);

        let Some(pos) = best_pos else { break };
        let chosen = remaining.swap_remove(pos);
        selected.push(chosen);

        for &i in &remaining {
            let sim = cosine_similarity(vectors[i], vectors[chosen]);
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }
    }

    selected
}

/// Order (relevance, id) pairs for candidate fetching
pub(crate) fn by_relevance(a: (f32, &ChunkId), b: (f32, &ChunkId)) -> Ordering {
    rank_order(a.0, a.1, b.0, b.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ChunkId> {
        (0..n).map(|i| ChunkId::new("doc", i)).collect()
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_lambda_one_is_relevance_order() {
        let owned = ids(3);
        let id_refs: Vec<&ChunkId> = owned.iter().collect();
        let v: Vec<Vec<f32>> = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let v_refs: Vec<&[f32]> = v.iter().map(|x| x.as_slice()).collect();
        let relevance = [0.9, 0.8, 0.1];

        assert_eq!(select_mmr(&id_refs, &v_refs, &relevance, 3, 1.0), vec![0, 1, 2]);
    }

    #[test]
    fn test_diversity_penalizes_duplicates() {
        let owned = ids(3);
        let id_refs: Vec<&ChunkId> = owned.iter().collect();
        // 0 and 1 are identical; 2 is orthogonal but slightly less relevant
        let v: Vec<Vec<f32>> = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let v_refs: Vec<&[f32]> = v.iter().map(|x| x.as_slice()).collect();
        let relevance = [0.9, 0.85, 0.6];

        let picked = select_mmr(&id_refs, &v_refs, &relevance, 2, 0.5);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn test_ties_prefer_lower_id() {
        let owned = ids(2);
        let id_refs: Vec<&ChunkId> = vec![&owned[1], &owned[0]];
        let v: Vec<Vec<f32>> = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let v_refs: Vec<&[f32]> = v.iter().map(|x| x.as_slice()).collect();

        let picked = select_mmr(&id_refs, &v_refs, &[0.5, 0.5], 1, 0.7);
        assert_eq!(picked, vec![1]);
    }
}
