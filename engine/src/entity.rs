//! Entity types for the managed collection.

use crate::{Attributes, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field names that identify a record and are never treated as mutable.
pub const IDENTITY_FIELDS: [&str; 2] = ["id", "createdAt"];

/// A record of the managed collection.
///
/// Serializes as a flat JSON object: `id`, `createdAt`, then every mutable
/// attribute at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique identifier, opaque to the engine
    pub id: EntityId,
    /// Creation time as reported by the server
    pub created_at: DateTime<Utc>,
    /// Mutable attributes
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Entity {
    /// Create a new entity.
    pub fn new(id: impl Into<EntityId>, created_at: DateTime<Utc>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            created_at,
            attributes: strip_identity(attributes),
        }
    }

    /// Read a single attribute.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Return a copy with `changes` shallow-merged over the attributes.
    ///
    /// Identity fields in `changes` are ignored.
    pub fn merge(&self, changes: &Attributes) -> Self {
        let mut merged = self.clone();
        for (field, value) in changes {
            if IDENTITY_FIELDS.contains(&field.as_str()) {
                continue;
            }
            merged.attributes.insert(field.clone(), value.clone());
        }
        merged
    }

    /// Names of the mutable fields whose values differ between `self` and
    /// `other`, sorted. An absent field and `null` compare equal.
    pub fn differing_fields(&self, other: &Entity) -> Vec<String> {
        let mut fields: Vec<&String> = self
            .attributes
            .keys()
            .chain(other.attributes.keys())
            .collect();
        fields.sort();
        fields.dedup();

        fields
            .into_iter()
            .filter(|field| {
                let ours = self.attributes.get(*field).unwrap_or(&Value::Null);
                let theirs = other.attributes.get(*field).unwrap_or(&Value::Null);
                ours != theirs
            })
            .cloned()
            .collect()
    }
}

/// Drop `id` and `createdAt` from an attribute map.
pub fn strip_identity(mut attributes: Attributes) -> Attributes {
    for field in IDENTITY_FIELDS {
        attributes.remove(field);
    }
    attributes
}

/// Build an attribute map from a JSON object. Non-objects yield an empty map.
pub fn attributes(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}
