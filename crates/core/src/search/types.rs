//! Search request/result types and the cooperative cancellation token.

use crate::config;
use crate::entry::{EntryId, KnowledgeEntry, MetadataValue};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A search query against a store or router.
///
/// All four mechanisms compose in one request: metadata equality filters,
/// exact/hierarchical tag filters, cosine k-NN over the query embedding, and
/// optional relation-graph traversal.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    /// Query embedding. Must match the store dimension; must be non-empty.
    pub query: Vec<f32>,
    /// Number of results to return.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Relation-graph expansion depth. 0 disables traversal.
    #[serde(default)]
    pub traversal_depth: usize,
    /// Metadata equality predicates; all must match.
    #[serde(default)]
    pub filters: HashMap<String, MetadataValue>,
    /// Exact tag matches; an entry needs at least one hit across
    /// `tags`/`tag_prefixes` when either is non-empty.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Hierarchical tag prefixes: `"AI/ML"` matches `"AI/ML"` and
    /// `"AI/ML/..."` but not `"AI/MLops"`.
    #[serde(default)]
    pub tag_prefixes: Vec<String>,
    /// Near-duplicate mode: brute-force scoring, keep only hits with
    /// similarity at or above the exact-match threshold.
    #[serde(default)]
    pub use_exact: bool,
    /// HNSW candidate-list width; `None` uses the index default.
    #[serde(default)]
    pub ef_search: Option<usize>,
    /// Cap on total results produced by traversal.
    #[serde(default = "default_max_traversal_results")]
    pub max_traversal_results: usize,
    /// Hard cap on traversal depth, bounding `traversal_depth`.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Normalize the query to unit length before scoring (zero vectors pass
    /// through unchanged).
    #[serde(default = "default_true")]
    pub auto_normalize: bool,
}

fn default_k() -> usize {
    config::DEFAULT_K
}

fn default_max_traversal_results() -> usize {
    config::DEFAULT_MAX_TRAVERSAL_RESULTS
}

fn default_max_depth() -> usize {
    config::DEFAULT_MAX_DEPTH
}

fn default_true() -> bool {
    true
}

impl SearchRequest {
    /// A request with the given query vector and all defaults.
    pub fn new(query: Vec<f32>) -> Self {
        Self {
            query,
            k: config::DEFAULT_K,
            traversal_depth: 0,
            filters: HashMap::new(),
            tags: Vec::new(),
            tag_prefixes: Vec::new(),
            use_exact: false,
            ef_search: None,
            max_traversal_results: config::DEFAULT_MAX_TRAVERSAL_RESULTS,
            max_depth: config::DEFAULT_MAX_DEPTH,
            auto_normalize: true,
        }
    }

    /// Sets `k`.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Enables graph traversal to the given depth.
    pub fn traverse(mut self, depth: usize) -> Self {
        self.traversal_depth = depth;
        self
    }

    /// Adds a metadata equality filter.
    pub fn filter(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    /// Adds an exact tag constraint.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds a hierarchical tag-prefix constraint.
    pub fn tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefixes.push(prefix.into());
        self
    }

    /// Enables exact-match (near-duplicate) mode.
    pub fn exact(mut self) -> Self {
        self.use_exact = true;
        self
    }
}

/// A single scored search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched entry (snapshot at search time).
    pub entry: KnowledgeEntry,
    /// Cosine similarity to the query, decayed and weighted for traversal
    /// results. Non-negative.
    pub similarity: f32,
    /// Hops from a seed result; 0 for direct vector hits.
    pub traversal_depth: usize,
    /// For traversal results, the id this entry was reached from.
    pub source_entry_id: Option<EntryId>,
    /// Ids along the traversal path, starting at the seed.
    pub relation_path: Vec<EntryId>,
}

impl SearchResult {
    /// A depth-0 result for a direct vector hit.
    pub fn direct(entry: KnowledgeEntry, similarity: f32) -> Self {
        let path = vec![entry.id];
        Self {
            entry,
            similarity,
            traversal_depth: 0,
            source_entry_id: None,
            relation_path: path,
        }
    }
}

/// Cooperative cancellation for long-running searches.
///
/// Checked between pipeline stages (filter, vector search, traversal). A
/// cancelled search returns [`StoreError::Cancelled`](crate::error::StoreError)
/// and never partial results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
