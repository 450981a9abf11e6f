//! Search pipeline orchestration.
//!
//! One entry point, [`SearchEngine::search`], runs the fixed pipeline:
//! query normalization → candidate filtering → vector search (brute force or
//! HNSW, oversampled for traversal) → optional relation traversal → rerank.
//! The engine also owns the per-core usage counters; they are only updated
//! for searches that complete without cancellation.

use crate::config;
use crate::entry::{EntryId, KnowledgeEntry};
use crate::error::{Result, StoreError};
use crate::hnsw::distance::{cosine_similarity, normalized};
use crate::hnsw::HnswIndex;
use crate::search::filter::matches_request;
use crate::search::traversal::{expand, TraversalParams};
use crate::search::types::{CancelToken, SearchRequest, SearchResult};
use crate::storage::document_store::DocumentStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Stateless pipeline plus usage counters. One per store core.
#[derive(Debug, Default)]
pub struct SearchEngine {
    total_searches: AtomicU64,
    total_search_time_ms: AtomicU64,
}

impl SearchEngine {
    /// Creates an engine with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed searches.
    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    /// Mean wall-clock time per completed search, in milliseconds.
    pub fn average_search_time_ms(&self) -> f64 {
        let n = self.total_searches.load(Ordering::Relaxed);
        if n == 0 {
            return 0.0;
        }
        self.total_search_time_ms.load(Ordering::Relaxed) as f64 / n as f64
    }

    /// Total search wall-clock time in milliseconds.
    pub fn total_search_time_ms(&self) -> u64 {
        self.total_search_time_ms.load(Ordering::Relaxed)
    }

    /// Runs one search against a consistent snapshot of store and index.
    ///
    /// The caller holds the core's read lock for the duration, so the
    /// candidate scan and the index agree up to bounded index staleness,
    /// which the candidate intersection masks.
    pub fn search(
        &self,
        store: &DocumentStore,
        index: &HnswIndex,
        request: &SearchRequest,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<SearchResult>> {
        let started = Instant::now();

        if request.query.is_empty() {
            return Err(StoreError::InvalidArgument("query vector is empty".into()));
        }
        if request.query.len() != store.dimension() {
            return Err(StoreError::InvalidArgument(format!(
                "query dimension {} does not match store dimension {}",
                request.query.len(),
                store.dimension()
            )));
        }

        // Step 1: normalization. Zero-norm queries pass through unchanged.
        let query: Vec<f32> = if request.auto_normalize {
            normalized(&request.query).unwrap_or_else(|| request.query.clone())
        } else {
            request.query.clone()
        };

        // Step 2: candidate filtering over a full scan
        let candidates: Vec<&KnowledgeEntry> = store
            .scan()
            .filter(|e| matches_request(e, request))
            .collect();
        check_cancelled(cancel)?;

        // Step 3: vector search, oversampled so traversal has seeds to prune
        let oversample = request.k.saturating_mul(request.traversal_depth + 1);
        let brute_force = request.use_exact
            || candidates.len() < config::BRUTE_FORCE_CUTOFF
            || index.count() < config::BRUTE_FORCE_CUTOFF;

        let hits: Vec<SearchResult> = if brute_force {
            let mut scored: Vec<(f32, &KnowledgeEntry)> = candidates
                .iter()
                .filter_map(|e| {
                    e.embedding
                        .as_ref()
                        .map(|emb| (cosine_similarity(&query, emb), *e))
                })
                .collect();
            // Stable sort: equal similarities keep insertion order
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(oversample);
            if request.use_exact {
                scored.retain(|&(sim, _)| sim >= config::EXACT_MATCH_THRESHOLD);
            }
            scored
                .into_iter()
                .map(|(sim, e)| SearchResult::direct(e.clone(), sim))
                .collect()
        } else {
            let ef = request.ef_search.unwrap_or(index.config().ef_search);
            let by_id: HashMap<EntryId, &KnowledgeEntry> =
                candidates.iter().map(|e| (e.id, *e)).collect();
            index
                .query(&query, oversample, ef)
                .into_iter()
                .filter_map(|(id, dist)| {
                    by_id
                        .get(&id)
                        .map(|e| SearchResult::direct((*e).clone(), 1.0 - dist))
                })
                .collect()
        };
        check_cancelled(cancel)?;

        // Step 4: relation traversal
        let mut results = if request.traversal_depth > 0 {
            expand(
                store,
                &query,
                hits,
                TraversalParams {
                    max_depth: request.traversal_depth.min(request.max_depth),
                    max_results: request.max_traversal_results,
                },
            )
        } else {
            hits
        };
        check_cancelled(cancel)?;

        // Step 5: rerank and truncate
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        results.truncate(request.k);

        // Step 6: counters, skipped on any earlier cancellation
        self.total_searches.fetch_add(1, Ordering::Relaxed);
        self.total_search_time_ms
            .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
        Ok(results)
    }
}

fn check_cancelled(cancel: Option<&CancelToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(StoreError::Cancelled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{MetadataValue, Relation};
    use uuid::Uuid;

    fn axis(dim: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[i] = 1.0;
        v
    }

    fn setup(entries: Vec<KnowledgeEntry>) -> (DocumentStore, HnswIndex) {
        let mut store = DocumentStore::new(4);
        let mut index = HnswIndex::with_default_config(4);
        for e in entries {
            if let Some(emb) = &e.embedding {
                index.add(e.id, emb);
            }
            store.insert(e);
        }
        (store, index)
    }

    #[test]
    fn test_empty_query_rejected() {
        let (store, index) = setup(vec![]);
        let engine = SearchEngine::new();
        let err = engine
            .search(&store, &index, &SearchRequest::new(vec![]), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(engine.total_searches(), 0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let (store, index) = setup(vec![]);
        let engine = SearchEngine::new();
        let err = engine
            .search(&store, &index, &SearchRequest::new(vec![1.0, 0.0]), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let (store, index) = setup(vec![]);
        let engine = SearchEngine::new();
        let out = engine
            .search(&store, &index, &SearchRequest::new(axis(4, 0)), None)
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(engine.total_searches(), 1);
    }

    #[test]
    fn test_exact_self_match() {
        let e = KnowledgeEntry::new("a").embedding(axis(4, 0));
        let id = e.id;
        let (store, index) = setup(vec![e]);
        let engine = SearchEngine::new();
        let out = engine
            .search(
                &store,
                &index,
                &SearchRequest::new(axis(4, 0)).k(1).exact(),
                None,
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.id, id);
        assert!(out[0].similarity >= 0.999);
    }

    #[test]
    fn test_exact_mode_drops_non_duplicates() {
        let near = KnowledgeEntry::new("near").embedding(vec![1.0, 0.05, 0.0, 0.0]);
        let (store, index) = setup(vec![near]);
        let engine = SearchEngine::new();
        let out = engine
            .search(
                &store,
                &index,
                &SearchRequest::new(axis(4, 0)).k(5).exact(),
                None,
            )
            .unwrap();
        assert!(out.is_empty(), "0.998-similar entry must not pass use_exact");
    }

    #[test]
    fn test_metadata_filter_restricts() {
        let a = KnowledgeEntry::new("a")
            .embedding(axis(4, 0))
            .meta("category", MetadataValue::String("AI".into()));
        let b = KnowledgeEntry::new("b")
            .embedding(axis(4, 1))
            .meta("category", MetadataValue::String("ML".into()));
        let a_id = a.id;
        let (store, index) = setup(vec![a, b]);
        let engine = SearchEngine::new();
        let out = engine
            .search(
                &store,
                &index,
                &SearchRequest::new(axis(4, 0))
                    .filter("category", MetadataValue::String("AI".into())),
                None,
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.id, a_id);
    }

    #[test]
    fn test_entries_without_embedding_not_in_vector_results() {
        let a = KnowledgeEntry::new("graph-only");
        let b = KnowledgeEntry::new("b").embedding(axis(4, 0));
        let b_id = b.id;
        let (store, index) = setup(vec![a, b]);
        let engine = SearchEngine::new();
        let out = engine
            .search(&store, &index, &SearchRequest::new(axis(4, 0)), None)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.id, b_id);
    }

    #[test]
    fn test_traversal_includes_neighbors() {
        let mut a = KnowledgeEntry::new("a").embedding(axis(4, 0));
        let b = KnowledgeEntry::new("b").embedding(vec![0.9, 0.1, 0.0, 0.0]);
        a.relations.push(Relation::to(b.id));
        let (a_id, b_id) = (a.id, b.id);
        let (store, index) = setup(vec![a, b]);
        let engine = SearchEngine::new();
        let out = engine
            .search(
                &store,
                &index,
                &SearchRequest::new(axis(4, 0)).k(10).traverse(2),
                None,
            )
            .unwrap();
        assert!(out.iter().any(|r| r.entry.id == a_id && r.traversal_depth == 0));
        assert!(out.iter().any(|r| r.entry.id == b_id));
    }

    #[test]
    fn test_cancellation_returns_no_partial_results() {
        let e = KnowledgeEntry::new("a").embedding(axis(4, 0));
        let (store, index) = setup(vec![e]);
        let engine = SearchEngine::new();
        let token = CancelToken::new();
        token.cancel();
        let err = engine
            .search(&store, &index, &SearchRequest::new(axis(4, 0)), Some(&token))
            .unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert_eq!(engine.total_searches(), 0);
        assert_eq!(engine.total_search_time_ms(), 0);
    }

    #[test]
    fn test_zero_vector_query_is_legal() {
        let e = KnowledgeEntry::new("a").embedding(axis(4, 0));
        let (store, index) = setup(vec![e]);
        let engine = SearchEngine::new();
        let out = engine
            .search(&store, &index, &SearchRequest::new(vec![0.0; 4]), None)
            .unwrap();
        // Any k closest ids may come back; similarity is 0 for all
        assert!(out.iter().all(|r| r.similarity == 0.0));
    }

    #[test]
    fn test_counters_accumulate() {
        let e = KnowledgeEntry::new("a").embedding(axis(4, 0));
        let (store, index) = setup(vec![e]);
        let engine = SearchEngine::new();
        for _ in 0..3 {
            engine
                .search(&store, &index, &SearchRequest::new(axis(4, 0)), None)
                .unwrap();
        }
        assert_eq!(engine.total_searches(), 3);
    }

    #[test]
    fn test_k_truncates() {
        let entries: Vec<KnowledgeEntry> = (0..8)
            .map(|i| {
                let angle = i as f32 * 0.1;
                KnowledgeEntry::new(format!("e{i}"))
                    .embedding(vec![angle.cos(), angle.sin(), 0.0, 0.0])
            })
            .collect();
        let (store, index) = setup(entries);
        let engine = SearchEngine::new();
        let out = engine
            .search(&store, &index, &SearchRequest::new(axis(4, 0)).k(3), None)
            .unwrap();
        assert_eq!(out.len(), 3);
        for w in out.windows(2) {
            assert!(w[0].similarity >= w[1].similarity);
        }
    }

    #[test]
    fn test_unused_ids() {
        // Ids the index never saw must not break candidate intersection
        let a = KnowledgeEntry::new("a").embedding(axis(4, 0));
        let (store, mut index) = setup(vec![a.clone()]);
        index.add(Uuid::new_v4(), &axis(4, 1));
        let engine = SearchEngine::new();
        let out = engine
            .search(&store, &index, &SearchRequest::new(axis(4, 0)), None)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.id, a.id);
    }
}
