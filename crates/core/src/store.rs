//! Single-shard store facade.
//!
//! [`StoreCore`] owns one document store, one HNSW index, and one search
//! engine behind a multi-reader / single-writer lock. It enforces the store
//! invariants: embedding dimension checks, relation weight clamping, lazy
//! bidirectional relation maintenance, the soft-delete lifecycle, and the
//! agreement between index contents and live embedded entries.

use crate::config;
use crate::entry::{EntryId, KnowledgeEntry};
use crate::error::{Result, StoreError};
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::json;
use crate::search::{CancelToken, SearchEngine, SearchRequest, SearchResult};
use crate::stats::VectorDbStats;
use crate::storage::{load_store, save_store, DocumentStore, EncryptionKey};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Construction-time parameters for a store core.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Embedding dimension, fixed for the life of the store.
    pub dimension: usize,
    /// HNSW tuning parameters.
    pub hnsw: HnswConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: config::DEFAULT_DIMENSION,
            hnsw: HnswConfig::default(),
        }
    }
}

struct CoreState {
    documents: DocumentStore,
    index: HnswIndex,
    last_updated: Option<DateTime<Utc>>,
    last_index_rebuild: Option<DateTime<Utc>>,
    dirty: bool,
}

/// A single shard: document store + HNSW index + search engine.
///
/// Writers serialize on the internal lock; searches and stats reads share it.
/// Dropping the core flushes a dirty snapshot best-effort.
pub struct StoreCore {
    path: PathBuf,
    encryption: Option<EncryptionKey>,
    state: RwLock<CoreState>,
    engine: SearchEngine,
    start_time: Instant,
}

impl StoreCore {
    /// Opens (or creates) a store at `connection_string` with default
    /// configuration. `password` enables at-rest snapshot encryption.
    pub fn open(connection_string: impl Into<PathBuf>, password: Option<&str>) -> Result<Self> {
        Self::open_with_config(connection_string, password, StoreConfig::default())
    }

    /// Opens (or creates) a store with explicit configuration.
    ///
    /// An existing snapshot is loaded and validated, and the index is rebuilt
    /// from its live embedded entries. A snapshot whose dimension differs
    /// from `store_config.dimension` is rejected.
    pub fn open_with_config(
        connection_string: impl Into<PathBuf>,
        password: Option<&str>,
        store_config: StoreConfig,
    ) -> Result<Self> {
        let path = connection_string.into();
        let encryption = password.map(EncryptionKey::from_password);

        let documents = if path.exists() {
            let loaded = load_store(&path, encryption.as_ref())?;
            if loaded.dimension() != store_config.dimension {
                return Err(StoreError::InvalidArgument(format!(
                    "snapshot dimension {} does not match configured dimension {}",
                    loaded.dimension(),
                    store_config.dimension
                )));
            }
            loaded
        } else {
            DocumentStore::new(store_config.dimension)
        };

        let mut index = HnswIndex::new(store_config.dimension, store_config.hnsw);
        for entry in documents.scan() {
            if !entry.is_deleted {
                if let Some(emb) = &entry.embedding {
                    index.add(entry.id, emb);
                }
            }
        }

        Ok(Self {
            path,
            encryption,
            state: RwLock::new(CoreState {
                documents,
                index,
                last_updated: None,
                last_index_rebuild: None,
                dirty: false,
            }),
            engine: SearchEngine::new(),
            start_time: Instant::now(),
        })
    }

    /// The embedding dimension this store was constructed with.
    pub fn dimension(&self) -> usize {
        self.state.read().documents.dimension()
    }

    /// Inserts a new entry or fully replaces an existing one.
    ///
    /// An empty (nil) id gets a fresh one, returned to the caller.
    /// `created_at` is preserved across updates; `updated_at` always
    /// advances. Relation weights are clamped into the legal range, and
    /// every resolvable relation target gains a reciprocal edge.
    pub fn add(&self, entry: KnowledgeEntry) -> Result<EntryId> {
        let entry = self.validate(entry)?;
        let mut state = self.state.write();
        Ok(add_locked(&mut state, entry))
    }

    /// Inserts many entries under one writer lock acquisition.
    pub fn add_batch(
        &self,
        entries: impl IntoIterator<Item = KnowledgeEntry>,
    ) -> Result<Vec<EntryId>> {
        let validated: Vec<KnowledgeEntry> = entries
            .into_iter()
            .map(|e| self.validate(e))
            .collect::<Result<_>>()?;
        let mut state = self.state.write();
        Ok(validated
            .into_iter()
            .map(|e| add_locked(&mut state, e))
            .collect())
    }

    fn validate(&self, mut entry: KnowledgeEntry) -> Result<KnowledgeEntry> {
        if let Some(emb) = &entry.embedding {
            let dim = self.dimension();
            if emb.len() != dim {
                return Err(StoreError::InvalidArgument(format!(
                    "embedding dimension {} does not match store dimension {dim}",
                    emb.len()
                )));
            }
        }
        for rel in &mut entry.relations {
            rel.weight = rel
                .weight
                .clamp(config::RELATION_WEIGHT_MIN, config::RELATION_WEIGHT_MAX);
        }
        Ok(entry)
    }

    /// Runs a search against a consistent snapshot of the shard.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let state = self.state.read();
        self.engine
            .search(&state.documents, &state.index, request, None)
    }

    /// [`search`](Self::search) with a cooperative cancellation token.
    pub fn search_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<SearchResult>> {
        let state = self.state.read();
        self.engine
            .search(&state.documents, &state.index, request, Some(cancel))
    }

    /// Point lookup by id. Tombstoned entries are still returned.
    pub fn get(&self, id: &EntryId) -> Option<KnowledgeEntry> {
        self.state.read().documents.get(id).cloned()
    }

    /// Number of live (non-deleted) entries.
    pub fn count(&self) -> usize {
        self.state.read().documents.live_count()
    }

    /// A snapshot of every entry in scan order, tombstoned ones included.
    pub fn entries(&self) -> Vec<KnowledgeEntry> {
        self.state.read().documents.scan().cloned().collect()
    }

    /// Soft-deletes an entry and drops it from the index. Idempotent for
    /// already-deleted entries; unknown ids are an error.
    pub fn mark_for_deletion(&self, id: &EntryId) -> Result<()> {
        let mut state = self.state.write();
        let now = Utc::now();
        match state.documents.get_mut(id) {
            Some(entry) => {
                if !entry.is_deleted {
                    entry.is_deleted = true;
                    entry.deleted_at = Some(now);
                    entry.updated_at = now;
                }
            }
            None => return Err(StoreError::NotFound(format!("entry {id}"))),
        }
        state.index.remove(id);
        state.last_updated = Some(now);
        state.dirty = true;
        Ok(())
    }

    /// Clears every tombstone, restoring the entries to search (their
    /// embeddings re-enter the index). Returns how many were restored.
    pub fn clear_deleted_flags(&self) -> usize {
        let mut state = self.state.write();
        let state = &mut *state;
        let now = Utc::now();
        let deleted_ids: Vec<EntryId> = state
            .documents
            .scan()
            .filter(|e| e.is_deleted)
            .map(|e| e.id)
            .collect();
        for id in &deleted_ids {
            if let Some(entry) = state.documents.get_mut(id) {
                entry.is_deleted = false;
                entry.deleted_at = None;
                entry.updated_at = now;
                if let Some(emb) = &entry.embedding {
                    state.index.add(entry.id, emb);
                }
            }
        }
        if !deleted_ids.is_empty() {
            state.last_updated = Some(now);
            state.dirty = true;
        }
        deleted_ids.len()
    }

    /// Number of tombstoned entries awaiting purge or rebuild.
    pub fn get_deleted_count(&self) -> usize {
        self.state.read().documents.deleted_count()
    }

    /// Whether accumulated tombstones and index garbage justify a rebuild.
    pub fn should_rebuild(&self) -> bool {
        let state = self.state.read();
        let deleted = state.documents.deleted_count();
        let total = state.documents.len();
        deleted > config::REBUILD_DELETED_ABSOLUTE
            || deleted as f64 > config::REBUILD_DELETED_RATIO * total as f64
    }

    /// Rebuilds the index from scratch over live embedded entries, purging
    /// tombstoned entries in the same pass.
    ///
    /// Afterwards `get_deleted_count() == 0` and `should_rebuild()` is false.
    pub fn rebuild_index(&self) -> Result<()> {
        let mut state = self.state.write();
        let state = &mut *state;
        let purged = state.documents.remove_where(|e| e.is_deleted);

        let mut fresh = HnswIndex::new(
            state.documents.dimension(),
            state.index.config().clone(),
        );
        for entry in state.documents.scan() {
            if let Some(emb) = &entry.embedding {
                fresh.add(entry.id, emb);
            }
        }
        state.index = fresh;

        let now = Utc::now();
        state.last_index_rebuild = Some(now);
        state.last_updated = Some(now);
        state.dirty = true;
        tracing::info!(
            purged,
            indexed = state.index.count(),
            "rebuilt HNSW index"
        );
        Ok(())
    }

    /// Permanently removes every tombstoned entry from the document store.
    pub fn purge_deleted(&self) -> Result<usize> {
        let mut state = self.state.write();
        let purged = state.documents.remove_where(|e| e.is_deleted);
        if purged > 0 {
            state.last_updated = Some(Utc::now());
            state.dirty = true;
        }
        Ok(purged)
    }

    /// Loads entries from a JSON file (see [`crate::json`] for the format)
    /// through the normal `add` path. Returns how many entries were added.
    pub fn import_json(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let payload = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(format!("import file {path:?}"))
            } else {
                StoreError::StoreFailure(e)
            }
        })?;
        let entries = json::from_json_str(&payload)?;
        let validated: Vec<KnowledgeEntry> = entries
            .into_iter()
            .map(|e| self.validate(e))
            .collect::<Result<_>>()?;
        let count = validated.len();
        let mut state = self.state.write();
        for entry in validated {
            add_locked(&mut state, entry);
        }
        Ok(count)
    }

    /// Writes every entry (tombstoned included) to a JSON file in the
    /// indented PascalCase export format.
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let payload = {
            let state = self.state.read();
            json::to_json_string(state.documents.scan())?
        };
        fs::write(path.as_ref(), payload)?;
        Ok(())
    }

    /// A point-in-time statistics snapshot for this shard.
    pub fn get_stats(&self) -> VectorDbStats {
        let state = self.state.read();
        let live = state.documents.live_count();
        let dimension = state.documents.dimension();

        let mut category_counts: HashMap<String, usize> = HashMap::new();
        let mut tag_distribution: HashMap<String, usize> = HashMap::new();
        let mut doc_bytes = 0usize;
        for entry in state.documents.scan() {
            doc_bytes += entry.content.len()
                + entry.embedding.as_ref().map_or(0, |e| e.len() * 4)
                + entry.metadata.len() * 48
                + entry.tags.iter().map(|t| t.len() + 24).sum::<usize>()
                + entry.relations.len() * 56
                + 128;
            if entry.is_deleted {
                continue;
            }
            if let Some(category) = entry.metadata.get("category") {
                *category_counts.entry(category.to_string()).or_insert(0) += 1;
            }
            for tag in &entry.tags {
                *tag_distribution.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        let average_recall = if state.index.count() < config::BRUTE_FORCE_CUTOFF {
            1.0
        } else {
            config::ESTIMATED_HNSW_RECALL
        };

        VectorDbStats {
            total_entries: live,
            index_size: VectorDbStats::pca_components(live, dimension),
            hnsw_index_size: state.index.count(),
            memory_usage: doc_bytes + state.index.memory_bytes(),
            last_updated: state.last_updated,
            last_index_rebuild: state.last_index_rebuild,
            uptime: self.start_time.elapsed(),
            total_searches: self.engine.total_searches(),
            average_search_time_ms: self.engine.average_search_time_ms(),
            average_recall,
            database_size_bytes: fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
            active_connections: 1,
            metadata_category_counts: category_counts,
            tag_distribution,
        }
    }

    /// Persists a snapshot if anything changed since the last flush.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.dirty {
            save_store(&state.documents, &self.path, self.encryption.as_ref())?;
            state.dirty = false;
        }
        Ok(())
    }
}

impl Drop for StoreCore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("failed to flush store {:?} on drop: {e}", self.path);
        }
    }
}

fn add_locked(state: &mut CoreState, mut entry: KnowledgeEntry) -> EntryId {
    if entry.id.is_nil() {
        entry.id = Uuid::new_v4();
    }
    let now = Utc::now();
    if let Some(existing) = state.documents.get(&entry.id) {
        entry.created_at = existing.created_at;
    }
    entry.updated_at = now;

    match &entry.embedding {
        Some(emb) => state.index.add(entry.id, emb),
        // An update may have dropped the embedding; the index must follow
        None => {
            state.index.remove(&entry.id);
        }
    }

    let source_id = entry.id;
    let relations = entry.relations.clone();
    state.documents.insert(entry);

    for rel in relations {
        if rel.target_id == source_id {
            continue;
        }
        match state.documents.get_mut(&rel.target_id) {
            Some(target) => {
                if !target.has_relation_to(source_id) {
                    target.relations.push(rel.reciprocal(source_id));
                    target.updated_at = now;
                }
            }
            None => {
                tracing::debug!(
                    source_id = %source_id,
                    target_id = %rel.target_id,
                    "relation target not in store, skipping reciprocal edge"
                );
            }
        }
    }

    state.last_updated = Some(now);
    state.dirty = true;
    source_id
}
