//! HNSW search: single-layer beam search and multi-layer k-NN query.
//!
//! Tombstoned nodes (removed or superseded mappings) are still used for
//! navigation but never surface in results. Distance ties break by ascending
//! internal id, i.e. ascending insertion order, so ranking is deterministic
//! for a given seed and insertion order.

use crate::entry::EntryId;
use crate::hnsw::distance::cosine_distance;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Min-heap candidate (via negated distance in a max-heap).
/// Ties pop the lower internal id first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance
            .cmp(&other.neg_distance)
            .then(other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap result entry; the worst (farthest, then latest-inserted) pops first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.cmp(&other.distance).then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Beam search within a single layer.
///
/// Returns up to `ef` live nodes closest to `query` at the given layer,
/// sorted ascending by `(distance, internal id)`. Tombstoned nodes navigate
/// but do not score.
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u32)> {
    visited.clear();
    visited.ensure_capacity(index.node_count());
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);
    let mut worst_dist = f32::MAX;

    for &ep in entry_points {
        if visited.insert(ep) {
            let dist = cosine_distance(query, index.vector(ep));
            candidates.push(Candidate {
                neg_distance: OrderedFloat(-dist),
                id: ep,
            });
            if index.is_live(ep) {
                results.push(ResultEntry {
                    distance: OrderedFloat(dist),
                    id: ep,
                });
                if results.len() >= ef {
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    while let Some(candidate) = candidates.pop() {
        let c_dist = -candidate.neg_distance.0;
        if results.len() >= ef && c_dist > worst_dist {
            break;
        }

        let node = candidate.id as usize;
        if layer >= index.neighbors[node].len() {
            continue;
        }

        for &neighbor in &index.neighbors[node][layer] {
            if !visited.insert(neighbor) {
                continue;
            }
            let dist = cosine_distance(query, index.vector(neighbor));
            if results.len() < ef || dist < worst_dist {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-dist),
                    id: neighbor,
                });
                if index.is_live(neighbor) {
                    results.push(ResultEntry {
                        distance: OrderedFloat(dist),
                        id: neighbor,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.id))
        .collect()
}

impl HnswIndex {
    /// k-nearest-neighbor query.
    ///
    /// Greedy descent from the entry point through the upper layers, then a
    /// beam search of width `max(ef_search, k)` at layer 0. Returns up to `k`
    /// `(entry id, cosine distance)` pairs sorted ascending by distance;
    /// equal distances order by ascending insertion.
    pub fn query(&self, query: &[f32], k: usize, ef_search: usize) -> Vec<(EntryId, f32)> {
        let Some(entry_point) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut visited = VisitedSet::with_capacity(self.node_count());
        let mut current_ep = entry_point;
        for layer in (1..=self.max_level).rev() {
            let nearest = search_layer(
                self,
                query,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut visited,
            );
            if let Some(&(_, n)) = nearest.first() {
                current_ep = n;
            }
        }

        let ef = ef_search.max(k);
        let mut hits = search_layer(
            self,
            query,
            std::slice::from_ref(&current_ep),
            ef,
            0,
            &mut visited,
        );
        hits.truncate(k);
        hits.into_iter()
            .map(|(dist, internal)| (self.node_ids[internal as usize], dist))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::graph::HnswConfig;
    use uuid::Uuid;

    fn axis(dim: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_query_empty_index() {
        let idx = HnswIndex::with_default_config(4);
        assert!(idx.query(&[1.0, 0.0, 0.0, 0.0], 5, 100).is_empty());
    }

    #[test]
    fn test_query_k_zero() {
        let mut idx = HnswIndex::with_default_config(4);
        idx.add(Uuid::new_v4(), &axis(4, 0));
        assert!(idx.query(&axis(4, 0), 0, 100).is_empty());
    }

    #[test]
    fn test_exact_neighbor_found() {
        let mut idx = HnswIndex::with_default_config(4);
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            idx.add(*id, &axis(4, i));
        }
        let hits = idx.query(&axis(4, 2), 1, 100);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, ids[2]);
        assert!(hits[0].1 < 1e-6);
    }

    #[test]
    fn test_results_sorted_by_distance() {
        let mut idx = HnswIndex::with_default_config(2);
        for i in 0..20 {
            let angle = i as f32 * 0.05;
            idx.add(Uuid::new_v4(), &[angle.cos(), angle.sin()]);
        }
        let hits = idx.query(&[1.0, 0.0], 10, 200);
        assert_eq!(hits.len(), 10);
        for w in hits.windows(2) {
            assert!(w[0].1 <= w[1].1, "distances not ascending");
        }
    }

    #[test]
    fn test_removed_id_not_returned() {
        let mut idx = HnswIndex::with_default_config(4);
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        idx.add(keep, &[1.0, 0.0, 0.0, 0.0]);
        idx.add(drop, &[0.9, 0.1, 0.0, 0.0]);
        idx.remove(&drop);
        let hits = idx.query(&[1.0, 0.0, 0.0, 0.0], 10, 100);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, keep);
    }

    #[test]
    fn test_updated_embedding_wins() {
        let mut idx = HnswIndex::with_default_config(4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        idx.add(a, &axis(4, 0));
        idx.add(b, &axis(4, 1));
        // Move a onto axis 2; the stale axis-0 node must not resurface as a
        idx.add(a, &axis(4, 2));
        let hits = idx.query(&axis(4, 2), 1, 100);
        assert_eq!(hits[0].0, a);
        assert!(hits[0].1 < 1e-6);
        let hits0 = idx.query(&axis(4, 0), 2, 100);
        assert!(hits0.iter().all(|&(_, d)| d >= 0.0));
        assert_eq!(hits0.iter().filter(|&&(id, _)| id == a).count(), 1);
    }

    #[test]
    fn test_recall_small_exhaustive() {
        // 200 pseudo-random vectors; every query's true nearest must be found
        let dim = 16;
        let mut idx = HnswIndex::new(dim, HnswConfig::default());
        let mut vectors = Vec::new();
        let mut state = 0x2545F4914F6CDD1Du64;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 40) as f32 / (1u32 << 24) as f32 - 0.5
        };
        for _ in 0..200 {
            let v: Vec<f32> = (0..dim).map(|_| next()).collect();
            let id = Uuid::new_v4();
            idx.add(id, &v);
            vectors.push((id, v));
        }
        let mut found = 0;
        for (qid, q) in vectors.iter().take(50) {
            let hits = idx.query(q, 1, 200);
            if hits.first().map(|&(id, _)| id) == Some(*qid) {
                found += 1;
            }
        }
        assert!(found >= 49, "self-recall too low: {found}/50");
    }

    #[test]
    fn test_deterministic_ranking() {
        let build = || {
            let mut idx = HnswIndex::with_default_config(8);
            for i in 0..100u128 {
                let id = Uuid::from_u128(i + 1);
                let v: Vec<f32> = (0..8).map(|j| ((i as usize * 31 + j * 7) % 13) as f32).collect();
                idx.add(id, &v);
            }
            idx
        };
        let a = build();
        let b = build();
        let q = vec![1.0, 3.0, 5.0, 7.0, 2.0, 4.0, 6.0, 8.0];
        assert_eq!(a.query(&q, 10, 50), b.query(&q, 10, 50));
    }
}
