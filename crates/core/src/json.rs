//! JSON import/export format for knowledge entries.
//!
//! The wire format is a JSON array of entry objects. Export writes indented
//! PascalCase; import additionally accepts camelCase keys via serde aliases.
//! Metadata values are plain JSON scalars on the wire and are converted to
//! and from the internally tagged [`MetadataValue`] here, at the boundary.

use crate::entry::{EntryId, KnowledgeEntry, MetadataValue, Relation};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire representation of a [`KnowledgeEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonEntry {
    #[serde(default, alias = "id")]
    pub id: EntryId,
    #[serde(default, alias = "content")]
    pub content: String,
    #[serde(default, alias = "embedding")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, alias = "metadata")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, alias = "tags")]
    pub tags: Vec<String>,
    #[serde(default, alias = "relations")]
    pub relations: Vec<JsonRelation>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "isDeleted")]
    pub is_deleted: bool,
    #[serde(default, alias = "deletedAt")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Wire representation of a [`Relation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonRelation {
    #[serde(alias = "targetId")]
    pub target_id: EntryId,
    #[serde(default = "default_weight", alias = "weight")]
    pub weight: f32,
    #[serde(
        default,
        rename = "Type",
        alias = "type",
        alias = "relationType",
        alias = "RelationType"
    )]
    pub relation_type: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_weight() -> f32 {
    1.0
}

impl From<&KnowledgeEntry> for JsonEntry {
    fn from(entry: &KnowledgeEntry) -> Self {
        Self {
            id: entry.id,
            content: entry.content.clone(),
            embedding: entry.embedding.clone(),
            metadata: entry
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), scalar_to_json(v)))
                .collect(),
            tags: entry.tags.clone(),
            relations: entry.relations.iter().map(JsonRelation::from).collect(),
            created_at: Some(entry.created_at),
            updated_at: Some(entry.updated_at),
            is_deleted: entry.is_deleted,
            deleted_at: entry.deleted_at,
        }
    }
}

impl From<&Relation> for JsonRelation {
    fn from(rel: &Relation) -> Self {
        Self {
            target_id: rel.target_id,
            weight: rel.weight,
            relation_type: rel.relation_type.clone(),
            created_at: Some(rel.created_at),
        }
    }
}

impl JsonEntry {
    /// Converts a wire entry into a store entry, validating metadata scalars.
    pub fn into_entry(self) -> Result<KnowledgeEntry> {
        let now = Utc::now();
        let mut metadata = HashMap::with_capacity(self.metadata.len());
        for (key, value) in self.metadata {
            metadata.insert(key.clone(), json_to_scalar(&key, value)?);
        }
        Ok(KnowledgeEntry {
            id: self.id,
            content: self.content,
            embedding: self.embedding,
            metadata,
            tags: self.tags,
            relations: self
                .relations
                .into_iter()
                .map(|r| Relation {
                    target_id: r.target_id,
                    weight: r.weight,
                    relation_type: r.relation_type,
                    created_at: r.created_at.unwrap_or(now),
                })
                .collect(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.or(self.created_at).unwrap_or(now),
            is_deleted: self.is_deleted,
            deleted_at: self.deleted_at,
        })
    }
}

fn scalar_to_json(value: &MetadataValue) -> serde_json::Value {
    match value {
        MetadataValue::Boolean(b) => serde_json::Value::Bool(*b),
        MetadataValue::Integer(i) => serde_json::Value::from(*i),
        MetadataValue::Float(f) => serde_json::Value::from(*f),
        MetadataValue::String(s) => serde_json::Value::String(s.clone()),
    }
}

fn json_to_scalar(key: &str, value: serde_json::Value) -> Result<MetadataValue> {
    match value {
        serde_json::Value::Bool(b) => Ok(MetadataValue::Boolean(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(MetadataValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(MetadataValue::Float(f))
            } else {
                Err(StoreError::InvalidArgument(format!(
                    "metadata value for '{key}' is not a representable number"
                )))
            }
        }
        serde_json::Value::String(s) => Ok(MetadataValue::String(s)),
        other => Err(StoreError::InvalidArgument(format!(
            "metadata value for '{key}' must be a scalar, got {other}"
        ))),
    }
}

/// Serializes entries to the indented PascalCase export format.
pub fn to_json_string<'a>(entries: impl Iterator<Item = &'a KnowledgeEntry>) -> Result<String> {
    let wire: Vec<JsonEntry> = entries.map(JsonEntry::from).collect();
    serde_json::to_string_pretty(&wire)
        .map_err(|e| StoreError::Corrupted(format!("export serialization failed: {e}")))
}

/// Parses an import payload into store entries.
pub fn from_json_str(payload: &str) -> Result<Vec<KnowledgeEntry>> {
    let wire: Vec<JsonEntry> = serde_json::from_str(payload)
        .map_err(|e| StoreError::InvalidArgument(format!("malformed import JSON: {e}")))?;
    wire.into_iter().map(JsonEntry::into_entry).collect()
}
