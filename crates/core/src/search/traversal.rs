//! Breadth-first relation-graph expansion with decayed similarity.
//!
//! Starting from a seed set of vector hits, follows outgoing relation edges
//! in declaration order, scoring each reached entry by its own cosine
//! similarity to the query, multiplied by `DECAY^hops` and the edge weight.
//! Cycles are cut by a visited set; dangling targets are skipped silently.

use crate::config;
use crate::entry::EntryId;
use crate::hnsw::distance::cosine_similarity;
use crate::search::types::SearchResult;
use crate::storage::document_store::DocumentStore;
use std::collections::{HashMap, HashSet, VecDeque};

/// Caps for one traversal run.
#[derive(Debug, Clone, Copy)]
pub struct TraversalParams {
    /// Maximum BFS depth; edges from nodes at this depth are not expanded.
    pub max_depth: usize,
    /// Maximum total number of results (seeds included).
    pub max_results: usize,
}

struct QueueItem {
    id: EntryId,
    depth: usize,
    source: Option<EntryId>,
    path: Vec<EntryId>,
}

/// Expands `seeds` through the relation graph of `store`.
///
/// Seeds keep their similarity at depth 0 and can never be overwritten by a
/// reciprocal edge leading back into them. Entries without an embedding score
/// 0 but still appear and still propagate the walk. Returns all reached
/// results sorted by descending similarity.
pub fn expand(
    store: &DocumentStore,
    query: &[f32],
    seeds: Vec<SearchResult>,
    params: TraversalParams,
) -> Vec<SearchResult> {
    let mut visited: HashSet<EntryId> = seeds.iter().map(|s| s.entry.id).collect();
    let mut results: HashMap<EntryId, SearchResult> = HashMap::with_capacity(seeds.len());
    let mut queue: VecDeque<QueueItem> = VecDeque::with_capacity(seeds.len());

    for seed in seeds {
        let id = seed.entry.id;
        queue.push_back(QueueItem {
            id,
            depth: 0,
            source: None,
            path: vec![id],
        });
        results.insert(id, seed);
    }

    while let Some(item) = queue.pop_front() {
        if results.len() >= params.max_results {
            break;
        }
        if item.depth >= params.max_depth {
            continue;
        }
        let Some(current) = store.get(&item.id) else {
            continue;
        };

        // Edges expand in declaration order, which fixes BFS tie order
        for rel in &current.relations {
            let target_id = rel.target_id;
            if !visited.insert(target_id) {
                continue;
            }
            let Some(target) = store.get(&target_id) else {
                tracing::debug!(target_id = %target_id, "skipping dangling relation target");
                continue;
            };

            let similarity = match &target.embedding {
                Some(emb) => {
                    let raw = cosine_similarity(query, emb);
                    let decayed = raw
                        * config::TRAVERSAL_DECAY.powi(item.depth as i32 + 1)
                        * rel.weight;
                    decayed.max(0.0)
                }
                None => 0.0,
            };

            let mut path = item.path.clone();
            path.push(target_id);
            results.insert(
                target_id,
                SearchResult {
                    entry: target.clone(),
                    similarity,
                    traversal_depth: item.depth + 1,
                    source_entry_id: Some(item.source.unwrap_or(item.id)),
                    relation_path: path.clone(),
                },
            );
            queue.push_back(QueueItem {
                id: target_id,
                depth: item.depth + 1,
                source: Some(item.id),
                path,
            });
        }
    }

    let mut out: Vec<SearchResult> = results.into_values().collect();
    out.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    out
}
