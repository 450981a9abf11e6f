//! Insertion-ordered document store for [`KnowledgeEntry`] records.
//!
//! Primary-key CRUD plus a full scan in stable insertion order. Scan order
//! matters: it seeds candidate filtering and fixes brute-force tie-breaks,
//! and index rebuilds replay entries in this order.

use crate::entry::{EntryId, KnowledgeEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory entry map with stable iteration order.
///
/// An entry keeps its original slot across updates; re-inserting an existing
/// id replaces the record without moving it in scan order.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentStore {
    dimension: usize,
    entries: HashMap<EntryId, KnowledgeEntry>,
    order: Vec<EntryId>,
}

impl DocumentStore {
    /// Creates an empty store for embeddings of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The fixed embedding dimension for this store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total records, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live (non-tombstoned) records.
    pub fn live_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_deleted).count()
    }

    /// Number of tombstoned records.
    pub fn deleted_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_deleted).count()
    }

    /// Whether a record with this id exists (tombstoned or not).
    pub fn contains(&self, id: &EntryId) -> bool {
        self.entries.contains_key(id)
    }

    /// Point lookup.
    pub fn get(&self, id: &EntryId) -> Option<&KnowledgeEntry> {
        self.entries.get(id)
    }

    /// Mutable point lookup.
    pub fn get_mut(&mut self, id: &EntryId) -> Option<&mut KnowledgeEntry> {
        self.entries.get_mut(id)
    }

    /// Upserts a record, preserving its scan position if the id is known.
    pub fn insert(&mut self, entry: KnowledgeEntry) {
        if !self.entries.contains_key(&entry.id) {
            self.order.push(entry.id);
        }
        self.entries.insert(entry.id, entry);
    }

    /// Removes a record by id.
    pub fn remove(&mut self, id: &EntryId) -> Option<KnowledgeEntry> {
        let removed = self.entries.remove(id)?;
        self.order.retain(|o| o != id);
        Some(removed)
    }

    /// Removes every record matching `predicate`, returning how many went.
    pub fn remove_where<F: Fn(&KnowledgeEntry) -> bool>(&mut self, predicate: F) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !predicate(e));
        let entries = &self.entries;
        self.order.retain(|id| entries.contains_key(id));
        before - self.entries.len()
    }

    /// Full scan in insertion order.
    pub fn scan(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Structural validation after deserialization.
    ///
    /// Checks that the order vector and the entry map agree and that every
    /// non-null embedding matches the store dimension.
    pub fn validate(&self) -> Result<(), String> {
        if self.order.len() != self.entries.len() {
            return Err(format!(
                "order length {} != entry count {}",
                self.order.len(),
                self.entries.len()
            ));
        }
        for id in &self.order {
            if !self.entries.contains_key(id) {
                return Err(format!("order references missing entry {id}"));
            }
        }
        for entry in self.entries.values() {
            if let Some(emb) = &entry.embedding {
                if emb.len() != self.dimension {
                    return Err(format!(
                        "entry {} embedding dimension {} != store dimension {}",
                        entry.id,
                        emb.len(),
                        self.dimension
                    ));
                }
            }
        }
        Ok(())
    }
}
