//! # knowledgedb-core
//!
//! Embedded vector knowledge store combining HNSW approximate
//! nearest-neighbor search over fixed-dimension embeddings with a document
//! store holding content, hierarchical tags, typed metadata, and a weighted
//! bidirectional relation graph. One search request fuses metadata equality
//! filters, exact/hierarchical tag filters, cosine k-NN, and breadth-first
//! graph traversal with decayed similarity propagation.
//!
//! This is a zero-async core library, suitable for embedding directly in
//! Rust applications. Use [`StoreCore`](store::StoreCore) for a single
//! store, or [`ShardRouter`](router::ShardRouter) to hash-partition writes
//! across several cores and merge reads.

/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Core entry types: `KnowledgeEntry`, `MetadataValue`, and `Relation`.
pub mod entry;
/// Error types for store operations.
pub mod error;
/// HNSW approximate nearest neighbor index.
pub mod hnsw;
/// JSON import/export format and conversions.
pub mod json;
/// Hash-sharded fan-out router.
pub mod router;
/// Search primitives: filtering, traversal, and pipeline orchestration.
pub mod search;
/// Store statistics and cross-shard aggregation.
pub mod stats;
/// Single-shard store facade.
pub mod store;
/// Storage layer: document store, encryption, and snapshot persistence.
pub mod storage;

pub use entry::{EntryId, KnowledgeEntry, MetadataValue, Relation};
pub use error::{Result, StoreError};
pub use router::ShardRouter;
pub use search::{CancelToken, SearchRequest, SearchResult};
pub use stats::VectorDbStats;
pub use store::{StoreConfig, StoreCore};
