//! Store statistics and cross-shard aggregation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config;

/// A point-in-time statistics snapshot for one store core or a whole router.
#[derive(Debug, Clone, Serialize)]
pub struct VectorDbStats {
    /// Live (non-deleted) entries.
    pub total_entries: usize,
    /// PCA component count of the stats artefact, or 0 below the threshold.
    pub index_size: usize,
    /// Live mappings in the HNSW index.
    pub hnsw_index_size: usize,
    /// Estimated resident bytes for documents and index.
    pub memory_usage: usize,
    /// Last mutation time.
    pub last_updated: Option<DateTime<Utc>>,
    /// Last completed index rebuild.
    pub last_index_rebuild: Option<DateTime<Utc>>,
    /// Time since the core (or oldest shard) was opened.
    pub uptime: Duration,
    /// Completed searches.
    pub total_searches: u64,
    /// Mean search latency in milliseconds.
    pub average_search_time_ms: f64,
    /// Estimated recall of the active search path.
    pub average_recall: f64,
    /// On-disk snapshot size.
    pub database_size_bytes: u64,
    /// Open store handles (1 per core; shard count for a router).
    pub active_connections: usize,
    /// Live-entry counts keyed by the `category` metadata value.
    pub metadata_category_counts: HashMap<String, usize>,
    /// Live-entry counts per tag.
    pub tag_distribution: HashMap<String, usize>,
}

impl VectorDbStats {
    /// Component count of the PCA stats artefact for a store of `live`
    /// entries at `dimension`. Instantiated from 10 entries up; never
    /// consulted by search.
    pub fn pca_components(live: usize, dimension: usize) -> usize {
        if live >= config::PCA_STATS_MIN_ENTRIES {
            live.min(dimension)
        } else {
            0
        }
    }

    /// Merges per-shard snapshots into a router-level view.
    ///
    /// Totals sum, uptime takes the max, search time averages weighted by
    /// search count, and the category/tag maps union by summing counts.
    pub fn merge(shards: Vec<VectorDbStats>) -> VectorDbStats {
        let mut merged = VectorDbStats {
            total_entries: 0,
            index_size: 0,
            hnsw_index_size: 0,
            memory_usage: 0,
            last_updated: None,
            last_index_rebuild: None,
            uptime: Duration::ZERO,
            total_searches: 0,
            average_search_time_ms: 0.0,
            average_recall: 0.0,
            database_size_bytes: 0,
            active_connections: 0,
            metadata_category_counts: HashMap::new(),
            tag_distribution: HashMap::new(),
        };

        let mut weighted_time = 0.0;
        let mut weighted_recall = 0.0;
        let mut recall_sum = 0.0;
        let shard_count = shards.len();

        for s in shards {
            merged.total_entries += s.total_entries;
            merged.index_size = merged.index_size.max(s.index_size);
            merged.hnsw_index_size += s.hnsw_index_size;
            merged.memory_usage += s.memory_usage;
            merged.last_updated = merged.last_updated.max(s.last_updated);
            merged.last_index_rebuild = merged.last_index_rebuild.max(s.last_index_rebuild);
            merged.uptime = merged.uptime.max(s.uptime);
            merged.total_searches += s.total_searches;
            weighted_time += s.average_search_time_ms * s.total_searches as f64;
            weighted_recall += s.average_recall * s.total_searches as f64;
            recall_sum += s.average_recall;
            merged.database_size_bytes += s.database_size_bytes;
            merged.active_connections += s.active_connections;
            for (k, v) in s.metadata_category_counts {
                *merged.metadata_category_counts.entry(k).or_insert(0) += v;
            }
            for (k, v) in s.tag_distribution {
                *merged.tag_distribution.entry(k).or_insert(0) += v;
            }
        }

        if merged.total_searches > 0 {
            merged.average_search_time_ms = weighted_time / merged.total_searches as f64;
            merged.average_recall = weighted_recall / merged.total_searches as f64;
        } else if shard_count > 0 {
            merged.average_recall = recall_sum / shard_count as f64;
        }
        merged
    }
}
