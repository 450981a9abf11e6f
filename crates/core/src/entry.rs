//! Core entry types: [`KnowledgeEntry`], [`MetadataValue`], and [`Relation`].
//!
//! A `KnowledgeEntry` is the unit of storage: opaque text content, an
//! optional fixed-dimension embedding, hierarchical `/`-separated tags,
//! typed key-value metadata, and weighted directed relations to other
//! entries. `MetadataValue` uses the default externally-tagged serde
//! representation for bincode compatibility; the JSON import/export layer
//! converts to/from plain scalars at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 128-bit opaque entry identifier, unique per shard and stable for the
/// life of the entry. The nil UUID means "unassigned"; the store assigns a
/// fresh id on first `add`.
pub type EntryId = Uuid;

/// A typed metadata value attached to an entry.
///
/// Equality is value equality; metadata filters in search requests compare
/// with `==`. Integer and float values are distinct types and never
/// cross-compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Boolean(b) => write!(f, "{b}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(x) => write!(f, "{x}"),
            MetadataValue::String(s) => f.write_str(s),
        }
    }
}

/// Relation type whose reciprocal edge carries `child_of`.
pub const REL_PARENT_OF: &str = "parent_of";
/// Relation type whose reciprocal edge carries `parent_of`.
pub const REL_CHILD_OF: &str = "child_of";
/// Relation type whose reciprocal edge carries `depended_by`.
pub const REL_DEPENDS_ON: &str = "depends_on";
/// Relation type whose reciprocal edge carries `depends_on`.
pub const REL_DEPENDED_BY: &str = "depended_by";

/// Returns the inverse relation type for reciprocal-edge maintenance.
///
/// Four labels have distinct inverses (`parent_of ↔ child_of`,
/// `depends_on ↔ depended_by`); every other label is its own inverse.
pub fn inverse_relation_type(relation_type: &str) -> &str {
    match relation_type {
        REL_PARENT_OF => REL_CHILD_OF,
        REL_CHILD_OF => REL_PARENT_OF,
        REL_DEPENDS_ON => REL_DEPENDED_BY,
        REL_DEPENDED_BY => REL_DEPENDS_ON,
        other => other,
    }
}

/// A directed, weighted edge from the containing entry to `target_id`.
///
/// Dangling targets are tolerated everywhere: traversal and reciprocity
/// maintenance skip them silently (logged at debug level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    /// Identifier of the related entry.
    pub target_id: EntryId,
    /// Similarity multiplier in `[0.1, 2.0]`; 1.0 is neutral. Clamped on add.
    pub weight: f32,
    /// Optional label from an open set. See [`inverse_relation_type`].
    pub relation_type: Option<String>,
    /// When the edge was created.
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// Creates a neutral-weight relation with no type label.
    pub fn to(target_id: EntryId) -> Self {
        Self {
            target_id,
            weight: 1.0,
            relation_type: None,
            created_at: Utc::now(),
        }
    }

    /// Creates a typed relation with the given weight.
    pub fn typed(target_id: EntryId, weight: f32, relation_type: impl Into<String>) -> Self {
        Self {
            target_id,
            weight,
            relation_type: Some(relation_type.into()),
            created_at: Utc::now(),
        }
    }

    /// The reciprocal edge pointing back at `source_id`: same weight,
    /// inverse type.
    pub fn reciprocal(&self, source_id: EntryId) -> Self {
        Self {
            target_id: source_id,
            weight: self.weight,
            relation_type: self
                .relation_type
                .as_deref()
                .map(|t| inverse_relation_type(t).to_string()),
            created_at: Utc::now(),
        }
    }
}

/// A stored knowledge entry.
///
/// Entries without an embedding are never returned by vector search but
/// still participate in the relation graph (scored 0 when reached by
/// traversal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique identifier. Nil means "assign one on add".
    pub id: EntryId,
    /// Opaque payload. Not interpreted by the engine.
    pub content: String,
    /// Fixed-dimension embedding, or `None` for graph-only entries.
    pub embedding: Option<Vec<f32>>,
    /// Key-value metadata used by equality filters.
    pub metadata: HashMap<String, MetadataValue>,
    /// Hierarchical `/`-separated tag paths, e.g. `"AI/ML/NeuralNetworks"`.
    pub tags: Vec<String>,
    /// Outgoing relation edges, in declaration order.
    pub relations: Vec<Relation>,
    /// Creation timestamp. Preserved across updates.
    pub created_at: DateTime<Utc>,
    /// Last-modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete tombstone flag.
    pub is_deleted: bool,
    /// When the tombstone was set.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl KnowledgeEntry {
    /// Creates an entry with a fresh random id and current timestamps.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), content)
    }

    /// Creates an entry with a specific id.
    pub fn with_id(id: EntryId, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            content: content.into(),
            embedding: None,
            metadata: HashMap::new(),
            tags: Vec::new(),
            relations: Vec::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Sets the embedding.
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Adds a metadata key-value pair.
    pub fn meta(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Adds a tag path.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds an outgoing relation.
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Whether this entry already holds any edge pointing at `target`.
    pub fn has_relation_to(&self, target: EntryId) -> bool {
        self.relations.iter().any(|r| r.target_id == target)
    }
}
