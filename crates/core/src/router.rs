//! Hash-sharded fan-out over independent store cores.
//!
//! Writes route to one shard by a stable 32-bit hash of the entry id's
//! string form; reads fan out to every shard in parallel and merge by
//! similarity. There are no cross-shard transactions and no cross-shard
//! graph edges: traversal stays local to each shard.

use crate::entry::{EntryId, KnowledgeEntry};
use crate::error::Result;
use crate::search::{SearchRequest, SearchResult};
use crate::stats::VectorDbStats;
use crate::store::{StoreConfig, StoreCore};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Routes operations across `N` independent [`StoreCore`]s.
///
/// Shard files live at `"{base_path}_{i}.db"` for `i ∈ [0, shard_count)`.
/// Shard identities are fixed at construction; the router itself holds no
/// mutable state beyond its children.
pub struct ShardRouter {
    shards: Vec<StoreCore>,
}

impl ShardRouter {
    /// Opens (or creates) `shard_count` shards with default configuration.
    pub fn open(shard_count: usize, base_path: &str, password: Option<&str>) -> Result<Self> {
        Self::open_with_config(shard_count, base_path, password, StoreConfig::default())
    }

    /// Opens (or creates) shards with explicit configuration.
    pub fn open_with_config(
        shard_count: usize,
        base_path: &str,
        password: Option<&str>,
        store_config: StoreConfig,
    ) -> Result<Self> {
        let shards = (0..shard_count)
            .map(|i| {
                StoreCore::open_with_config(
                    format!("{base_path}_{i}.db"),
                    password,
                    store_config.clone(),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { shards })
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Stable shard assignment: crc32 of the id's string form, mod N.
    pub fn shard_of(&self, id: &EntryId) -> usize {
        (crc32fast::hash(id.to_string().as_bytes()) as usize) % self.shards.len()
    }

    /// Adds an entry to its home shard. Empty ids are assigned before
    /// routing, so the assignment is stable for the life of the entry.
    pub fn add(&self, mut entry: KnowledgeEntry) -> Result<EntryId> {
        if entry.id.is_nil() {
            entry.id = Uuid::new_v4();
        }
        self.shards[self.shard_of(&entry.id)].add(entry)
    }

    /// Adds entries grouped by home shard, one batch per shard.
    pub fn add_batch(
        &self,
        entries: impl IntoIterator<Item = KnowledgeEntry>,
    ) -> Result<Vec<EntryId>> {
        let mut per_shard: HashMap<usize, Vec<KnowledgeEntry>> = HashMap::new();
        let mut ids = Vec::new();
        for mut entry in entries {
            if entry.id.is_nil() {
                entry.id = Uuid::new_v4();
            }
            ids.push(entry.id);
            per_shard.entry(self.shard_of(&entry.id)).or_default().push(entry);
        }
        for (shard, batch) in per_shard {
            self.shards[shard].add_batch(batch)?;
        }
        Ok(ids)
    }

    /// Fans the request out to every shard in parallel, concatenates the
    /// per-shard results, and keeps the global top `k` by similarity.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let per_shard: Vec<Vec<SearchResult>> = self
            .shards
            .par_iter()
            .map(|shard| shard.search(request))
            .collect::<Result<_>>()?;

        let mut merged: Vec<SearchResult> = per_shard.into_iter().flatten().collect();
        merged.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        merged.truncate(request.k);
        Ok(merged)
    }

    /// Point lookup on the entry's home shard.
    pub fn get(&self, id: &EntryId) -> Option<KnowledgeEntry> {
        self.shards[self.shard_of(id)].get(id)
    }

    /// Total live entries across shards.
    pub fn count(&self) -> usize {
        self.shards.iter().map(StoreCore::count).sum()
    }

    /// Soft-deletes on the entry's home shard.
    pub fn mark_for_deletion(&self, id: &EntryId) -> Result<()> {
        self.shards[self.shard_of(id)].mark_for_deletion(id)
    }

    /// Total tombstones across shards.
    pub fn get_deleted_count(&self) -> usize {
        self.shards.iter().map(StoreCore::get_deleted_count).sum()
    }

    /// Whether any shard wants a rebuild.
    pub fn should_rebuild(&self) -> bool {
        self.shards.iter().any(StoreCore::should_rebuild)
    }

    /// Rebuilds every shard's index.
    pub fn rebuild_index(&self) -> Result<()> {
        self.shards.iter().try_for_each(StoreCore::rebuild_index)
    }

    /// Purges tombstones on every shard, returning the total removed.
    pub fn purge_deleted(&self) -> Result<usize> {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.purge_deleted()?;
        }
        Ok(total)
    }

    /// Imports a JSON entry file, routing each entry to its home shard.
    pub fn import_json(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let payload = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                crate::error::StoreError::NotFound(format!("import file {path:?}"))
            } else {
                crate::error::StoreError::StoreFailure(e)
            }
        })?;
        let entries = crate::json::from_json_str(&payload)?;
        let count = entries.len();
        self.add_batch(entries)?;
        Ok(count)
    }

    /// Exports every entry from every shard into one JSON file.
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut all: Vec<KnowledgeEntry> = Vec::new();
        for shard in &self.shards {
            all.extend(shard.entries());
        }
        let payload = crate::json::to_json_string(all.iter())?;
        std::fs::write(path.as_ref(), payload)?;
        Ok(())
    }

    /// Aggregated statistics: sums totals, maxes uptime, length-weights the
    /// average search time, and unions the category/tag maps.
    pub fn get_stats(&self) -> VectorDbStats {
        VectorDbStats::merge(self.shards.iter().map(StoreCore::get_stats).collect())
    }

    /// Flushes every shard's snapshot.
    pub fn flush(&self) -> Result<()> {
        self.shards.iter().try_for_each(StoreCore::flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::HnswConfig;

    fn open_router(dir: &tempfile::TempDir, shards: usize) -> ShardRouter {
        let base = dir.path().join("shard");
        ShardRouter::open_with_config(
            shards,
            base.to_str().unwrap(),
            None,
            StoreConfig {
                dimension: 4,
                hnsw: HnswConfig::default(),
            },
        )
        .unwrap()
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[i % 4] = 1.0;
        v
    }

    #[test]
    fn test_routing_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 4);
        let id = Uuid::new_v4();
        let first = router.shard_of(&id);
        for _ in 0..10 {
            assert_eq!(router.shard_of(&id), first);
        }
        assert!(first < 4);
    }

    #[test]
    fn test_add_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 2);
        let id = router
            .add(KnowledgeEntry::new("routed").embedding(axis(0)))
            .unwrap();
        let got = router.get(&id).unwrap();
        assert_eq!(got.content, "routed");
    }

    #[test]
    fn test_stats_sum_across_shards() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 2);
        for i in 0..10 {
            router
                .add(KnowledgeEntry::new(format!("e{i}")).embedding(axis(i)))
                .unwrap();
        }
        let stats = router.get_stats();
        assert_eq!(stats.total_entries, 10);
        assert_eq!(stats.active_connections, 2);

        let shard_sum: usize = router
            .shards
            .iter()
            .map(|s| s.get_stats().total_entries)
            .sum();
        assert_eq!(shard_sum, stats.total_entries);
    }

    #[test]
    fn test_search_merges_across_shards() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 3);
        let mut ids = Vec::new();
        for i in 0..12 {
            ids.push(
                router
                    .add(KnowledgeEntry::new(format!("e{i}")).embedding(axis(0)))
                    .unwrap(),
            );
        }
        let out = router.search(&SearchRequest::new(axis(0)).k(5)).unwrap();
        assert_eq!(out.len(), 5);
        for r in &out {
            assert!(r.similarity > 0.999);
            assert!(ids.contains(&r.entry.id));
        }
    }

    #[test]
    fn test_delete_routes_to_home_shard() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 2);
        let id = router
            .add(KnowledgeEntry::new("victim").embedding(axis(0)))
            .unwrap();
        router.mark_for_deletion(&id).unwrap();
        assert_eq!(router.get_deleted_count(), 1);
        let out = router.search(&SearchRequest::new(axis(0))).unwrap();
        assert!(out.iter().all(|r| r.entry.id != id));
        assert_eq!(router.purge_deleted().unwrap(), 1);
        assert!(router.get(&id).is_none());
    }

    #[test]
    fn test_batch_routes_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 4);
        let entries: Vec<KnowledgeEntry> = (0..20)
            .map(|i| KnowledgeEntry::new(format!("b{i}")).embedding(axis(i)))
            .collect();
        let ids = router.add_batch(entries).unwrap();
        assert_eq!(ids.len(), 20);
        assert_eq!(router.count(), 20);
        for id in &ids {
            assert!(router.get(id).is_some());
        }
    }

    #[test]
    fn test_export_import_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 2);
        for i in 0..6 {
            router
                .add(
                    KnowledgeEntry::new(format!("e{i}"))
                        .embedding(axis(i))
                        .tag("AI/ML"),
                )
                .unwrap();
        }
        let json_path = dir.path().join("dump.json");
        router.export_json(&json_path).unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let other = open_router(&dir2, 3);
        assert_eq!(other.import_json(&json_path).unwrap(), 6);
        assert_eq!(other.count(), 6);
    }

    #[test]
    fn test_rebuild_all_shards() {
        let dir = tempfile::tempdir().unwrap();
        let router = open_router(&dir, 2);
        let mut ids = Vec::new();
        for i in 0..8 {
            ids.push(
                router
                    .add(KnowledgeEntry::new(format!("e{i}")).embedding(axis(i)))
                    .unwrap(),
            );
        }
        for id in ids.iter().take(4) {
            router.mark_for_deletion(id).unwrap();
        }
        router.rebuild_index().unwrap();
        assert_eq!(router.get_deleted_count(), 0);
        assert!(!router.should_rebuild());
        assert_eq!(router.count(), 4);
    }
}
