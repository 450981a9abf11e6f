//! Global configuration constants for knowledgedb.
//!
//! All tuning parameters, validation limits, and statistical thresholds are
//! defined here. These are compile-time constants; per-store configuration is
//! handled via [`StoreConfig`](crate::store::StoreConfig) at construction.

/// Default embedding dimension for a store.
///
/// Fixed per store instance at construction; every non-null embedding must
/// match it exactly.
pub const DEFAULT_DIMENSION: usize = 384;

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64.
pub const HNSW_DEFAULT_M: usize = 32;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 400;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Expected node capacity used to pre-size index allocations.
pub const HNSW_EXPECTED_CAPACITY: usize = 100_000;

/// Seed for the HNSW level-assignment RNG.
///
/// A fixed seed makes layer assignment, and therefore ranking ties, fully
/// deterministic for a given insertion order.
pub const HNSW_DEFAULT_SEED: u64 = 42;

/// Per-hop similarity decay applied during relation traversal.
///
/// A result reached in `d` hops is scored at most `DECAY^d` times its raw
/// cosine similarity, so longer paths monotonically lose relevance.
pub const TRAVERSAL_DECAY: f32 = 0.95;

/// Candidate-set size below which search falls back to brute-force cosine.
///
/// Below this threshold an exhaustive scan is both faster than graph
/// navigation and exact, so the HNSW index is bypassed.
pub const BRUTE_FORCE_CUTOFF: usize = 1000;

/// Minimum similarity for a hit to survive an exact-match (`use_exact`) search.
pub const EXACT_MATCH_THRESHOLD: f32 = 0.999;

/// Lower bound for relation weights. Weights are clamped on write.
pub const RELATION_WEIGHT_MIN: f32 = 0.1;

/// Upper bound for relation weights. Weights are clamped on write.
pub const RELATION_WEIGHT_MAX: f32 = 2.0;

/// Absolute tombstone count above which an index rebuild is recommended.
pub const REBUILD_DELETED_ABSOLUTE: usize = 1000;

/// Tombstone-to-live ratio above which an index rebuild is recommended.
pub const REBUILD_DELETED_RATIO: f64 = 0.1;

/// Minimum live entry count before the PCA stats artefact is instantiated.
///
/// Below this, `index_size` in stats reports 0.
pub const PCA_STATS_MIN_ENTRIES: usize = 10;

/// Estimated recall@10 of the default HNSW configuration, reported in stats
/// once queries are served by the index rather than brute force.
pub const ESTIMATED_HNSW_RECALL: f64 = 0.99;

/// Default number of results per search request.
pub const DEFAULT_K: usize = 10;

/// Default cap on total results produced by relation traversal.
pub const DEFAULT_MAX_TRAVERSAL_RESULTS: usize = 1000;

/// Default hard cap on BFS depth during relation traversal.
pub const DEFAULT_MAX_DEPTH: usize = 5;
