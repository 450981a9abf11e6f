//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! Maps entry ids to raw f32 embeddings under cosine distance. The graph is
//! append-only: updates and removals tombstone nodes in place and the mapping
//! layer hides them from results; [`HnswIndex::rebuild`] reconstructs a clean
//! graph. Level assignment uses a seeded RNG so a given insertion order always
//! produces the same graph and the same ranking.

/// Cosine distance and vector helpers.
pub mod distance;
/// HNSW graph structure, configuration, and id mapping.
pub mod graph;
/// Insertion with bidirectional connections and heuristic pruning.
pub mod insert;
/// Layer beam search and multi-layer k-NN query.
pub mod search;
/// Bitset visited tracking for graph traversal.
pub mod visited;

pub use graph::{HnswConfig, HnswIndex};
