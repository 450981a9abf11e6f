//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search).
//! [`HnswIndex`] stores the graph in a Struct-of-Arrays layout: vector data
//! contiguous in an arena, with parallel arrays for neighbor lists, layer
//! assignments, and liveness.
//!
//! The graph is append-only. An external [`EntryId`] maps to its *current*
//! internal node; re-adding a known id appends a fresh node and repoints the
//! mapping, leaving the stale node in the graph as navigation garbage until
//! [`HnswIndex::rebuild`]. Removal only drops the mapping. Both cases are
//! reclaimed by a rebuild.

use crate::config;
use crate::entry::EntryId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Configuration parameters for an HNSW index, fixed at construction.
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Number of bidirectional links per node (except layer 0, which uses `m_max0`).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Default candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Expected node capacity, used to pre-size allocations.
    pub expected_capacity: usize,
    /// Seed for the level-assignment RNG. Fixed seed + fixed insertion order
    /// gives a fully deterministic graph.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            expected_capacity: config::HNSW_EXPECTED_CAPACITY,
            seed: config::HNSW_DEFAULT_SEED,
        }
    }
}

/// In-memory approximate nearest-neighbor index over cosine distance.
///
/// Maps `EntryId → embedding` and supports insert, mapping removal
/// (tombstone), k-NN query, and full rebuild. All mutation happens behind
/// the owner's lock; queries take `&self`.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    dimension: usize,
    // SoA: vector arena, dimension floats per node
    pub(crate) vectors: Vec<f32>,
    // SoA: graph structure, [node][layer][neighbor]
    pub(crate) neighbors: Vec<Vec<Vec<u32>>>,
    pub(crate) levels: Vec<u8>,
    /// False once a node's mapping was removed or superseded by a re-add.
    pub(crate) live: Vec<bool>,
    /// Internal node id → external entry id, in insertion order.
    pub(crate) node_ids: Vec<EntryId>,
    /// External entry id → current internal node id.
    pub(crate) id_to_node: HashMap<EntryId, u32>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
    rng: StdRng,
}

impl HnswIndex {
    /// Creates an empty index for vectors of the given dimension.
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        // Pre-size the id map only; the arenas grow as nodes arrive
        let map_cap = config.expected_capacity.min(1 << 14);
        let seed = config.seed;
        Self {
            config,
            dimension,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            levels: Vec::new(),
            live: Vec::new(),
            node_ids: Vec::new(),
            id_to_node: HashMap::with_capacity(map_cap),
            entry_point: None,
            max_level: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates an empty index with default configuration.
    pub fn with_default_config(dimension: usize) -> Self {
        Self::new(dimension, HnswConfig::default())
    }

    /// The fixed embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The construction-time configuration.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Number of live `(id, embedding)` mappings.
    pub fn count(&self) -> usize {
        self.id_to_node.len()
    }

    /// Returns `true` if no live mappings exist.
    pub fn is_empty(&self) -> bool {
        self.id_to_node.is_empty()
    }

    /// Total node slots in the graph, including garbage from updates/removals.
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    /// Whether `id` currently has a mapping.
    pub fn contains(&self, id: &EntryId) -> bool {
        self.id_to_node.contains_key(id)
    }

    /// The embedding currently mapped to `id`, if any.
    pub fn embedding_of(&self, id: &EntryId) -> Option<&[f32]> {
        self.id_to_node.get(id).map(|&n| self.vector(n))
    }

    /// Raw vector slice for an internal node id.
    #[inline]
    pub(crate) fn vector(&self, internal: u32) -> &[f32] {
        let start = internal as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Whether an internal node still backs a live mapping.
    #[inline]
    pub(crate) fn is_live(&self, internal: u32) -> bool {
        self.live[internal as usize]
    }

    /// Estimated resident bytes: vector arena, graph structure, and mappings.
    pub fn memory_bytes(&self) -> usize {
        let mut total = self.vectors.len() * 4;
        for node in &self.neighbors {
            total += 24;
            for layer in node {
                total += layer.len() * 4 + 24;
            }
        }
        total += self.levels.len();
        total += self.live.len();
        total += self.node_ids.len() * 16;
        total += self.id_to_node.len() * 24;
        total
    }

    /// Exponentially distributed layer assignment with `1/ln(M)` scaling.
    pub(crate) fn random_level(&mut self) -> usize {
        let ml = 1.0 / (self.config.m as f64).ln();
        let r: f64 = self.rng.gen();
        let level = (-r.max(f64::MIN_POSITIVE).ln() * ml).floor() as usize;
        level.min(self.config.max_layers - 1)
    }

    /// Inserts or updates the mapping for `id`.
    ///
    /// Unknown id: appends a node and links it into the graph. Known id: the
    /// old node is tombstoned (it stays reachable from stale links) and a
    /// fresh node carries the new embedding. Callers must rebuild to reclaim.
    ///
    /// The caller validates `vector.len() == self.dimension()`.
    pub fn add(&mut self, id: EntryId, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dimension);
        if let Some(&old) = self.id_to_node.get(&id) {
            self.live[old as usize] = false;
        }
        let internal = self.insert_node(id, vector);
        self.id_to_node.insert(id, internal);
    }

    /// Drops the mapping for `id`. The graph node stays for navigation and is
    /// skipped in query results. Returns `true` if a mapping existed.
    pub fn remove(&mut self, id: &EntryId) -> bool {
        match self.id_to_node.remove(id) {
            Some(internal) => {
                self.live[internal as usize] = false;
                true
            }
            None => false,
        }
    }

    /// Rebuilds the graph from scratch over the current mappings, in node
    /// insertion order, discarding all garbage. The RNG restarts from the
    /// configured seed, so rebuilding the same mapping yields the same graph.
    pub fn rebuild(&mut self) {
        let mut fresh = HnswIndex::new(self.dimension, self.config.clone());
        for (internal, id) in self.node_ids.iter().enumerate() {
            if self.live[internal] {
                fresh.add_from(*id, self.vector(internal as u32));
            }
        }
        *self = fresh;
    }

    // add() without the known-id branch; rebuild sources are unique by construction.
    fn add_from(&mut self, id: EntryId, vector: &[f32]) {
        let internal = self.insert_node(id, vector);
        self.id_to_node.insert(id, internal);
    }
}
