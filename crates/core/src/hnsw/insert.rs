//! HNSW node insertion with bidirectional connections and heuristic
//! neighbor pruning (Algorithm 4 from the HNSW paper).

use crate::entry::EntryId;
use crate::hnsw::distance::cosine_distance;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;

impl HnswIndex {
    /// Appends a node for `vector` and links it into the graph.
    /// Returns the new internal id. Mapping maintenance is the caller's job.
    pub(crate) fn insert_node(&mut self, id: EntryId, vector: &[f32]) -> u32 {
        let internal = self.node_ids.len() as u32;
        let level = self.random_level();

        // First node: no linking to do
        if self.entry_point.is_none() {
            self.push_node(id, vector, level);
            self.entry_point = Some(internal);
            self.max_level = level;
            return internal;
        }

        let entry_point = self.entry_point.expect("entry_point set after first insert");
        let top = level.min(self.max_level);
        let mut visited = VisitedSet::with_capacity(self.node_count());

        // Phase 1: greedy descent from the top layer down to level + 1
        let mut current_ep = entry_point;
        for layer in (level + 1..=self.max_level).rev() {
            let results = search_layer(
                self,
                vector,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut visited,
            );
            if let Some(&(_, nearest)) = results.first() {
                current_ep = nearest;
            }
        }

        // Phase 2: collect neighbors for the new node, layer by layer
        let mut node_neighbors: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        let mut layer_eps: Vec<u32> = vec![current_ep];
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                vector,
                &layer_eps,
                self.config.ef_construction,
                layer,
                &mut visited,
            );

            let m_max = if layer == 0 {
                self.config.m_max0
            } else {
                self.config.m
            };
            let selected = select_neighbors_heuristic(self, &candidates, m_max);
            node_neighbors[layer] = selected.iter().map(|&(_, n)| n).collect();

            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, n)| n));
            if layer_eps.is_empty() {
                layer_eps.push(entry_point);
            }
        }

        self.push_node(id, vector, level);
        self.neighbors[internal as usize] = node_neighbors;

        // Phase 3: add reverse links and prune over-capacity neighbors
        for layer in 0..=top {
            let m_max = if layer == 0 {
                self.config.m_max0
            } else {
                self.config.m
            };

            let my_neighbors: Vec<u32> = self.neighbors[internal as usize][layer].clone();
            for &neighbor in &my_neighbors {
                let n = neighbor as usize;
                while self.neighbors[n].len() <= layer {
                    self.neighbors[n].push(Vec::new());
                }
                self.neighbors[n][layer].push(internal);

                if self.neighbors[n][layer].len() > m_max {
                    let ids: Vec<u32> = self.neighbors[n][layer].clone();
                    let base = self.vector(neighbor);
                    let mut candidates: Vec<(f32, u32)> = ids
                        .iter()
                        .map(|&c| (cosine_distance(base, self.vector(c)), c))
                        .collect();
                    candidates
                        .sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                    let pruned = select_neighbors_heuristic(self, &candidates, m_max);
                    self.neighbors[n][layer] = pruned.iter().map(|&(_, c)| c).collect();
                }
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(internal);
        }
        internal
    }

    fn push_node(&mut self, id: EntryId, vector: &[f32], level: usize) {
        self.vectors.extend_from_slice(vector);
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.levels.push(level as u8);
        self.live.push(true);
        self.node_ids.push(id);
    }
}

/// Heuristic neighbor selection (Algorithm 4 from the HNSW paper).
///
/// A candidate is selected only if it is closer to the base point than to any
/// already-selected neighbor, which avoids redundant clusters of
/// near-identical neighbors. Remaining slots are filled with the closest
/// unused candidates.
fn select_neighbors_heuristic(
    index: &HnswIndex,
    candidates: &[(f32, u32)],
    m: usize,
) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    for &(dist_to_base, cand) in &sorted {
        if selected.len() >= m {
            break;
        }
        let cand_vec = index.vector(cand);
        let diverse = selected.iter().all(|&(_, s)| {
            dist_to_base <= cosine_distance(cand_vec, index.vector(s))
        });
        if diverse {
            selected.push((dist_to_base, cand));
        }
    }

    if selected.len() < m {
        for &(dist, cand) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected.iter().any(|&(_, s)| s == cand) {
                selected.push((dist, cand));
            }
        }
    }

    selected
}
