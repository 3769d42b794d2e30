//! Pending mutation types.
//!
//! A [`PendingMutation`] is the durable record of an optimistic edit whose
//! remote call has not settled yet. It is replayed on the next boot if the
//! process dies before the call settles.

use crate::{EntityId, MutationId, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A not-yet-confirmed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    /// Mutation ID
    pub id: MutationId,
    /// Create, update or delete
    #[serde(rename = "type")]
    pub kind: MutationKind,
    /// When the optimistic edit was dispatched (milliseconds since epoch)
    pub timestamp: Timestamp,
    /// Entity fields for create/update, `{"id": ...}` for delete
    pub payload: serde_json::Value,
    /// Target entity for update/delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
}

impl PendingMutation {
    /// A create mutation carrying the new entity's fields.
    pub fn create(id: impl Into<MutationId>, payload: serde_json::Value, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            kind: MutationKind::Create,
            timestamp,
            payload,
            target_id: None,
        }
    }

    /// An update mutation carrying the changed fields.
    pub fn update(
        id: impl Into<MutationId>,
        target_id: impl Into<EntityId>,
        payload: serde_json::Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            kind: MutationKind::Update,
            timestamp,
            payload,
            target_id: Some(target_id.into()),
        }
    }

    /// A delete mutation.
    pub fn delete(id: impl Into<MutationId>, target_id: impl Into<EntityId>, timestamp: Timestamp) -> Self {
        let target_id = target_id.into();
        Self {
            id: id.into(),
            kind: MutationKind::Delete,
            timestamp,
            payload: serde_json::json!({ "id": target_id }),
            target_id: Some(target_id),
        }
    }

    /// Age of this mutation at `now`. Mutations from the future have age zero.
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

/// Short random suffix used to disambiguate ids minted in the same millisecond.
pub(crate) fn random_suffix() -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(9);
    suffix
}

/// Generate a unique mutation ID.
pub fn generate_mutation_id(now: Timestamp) -> MutationId {
    format!("mutation-{}-{}", now, random_suffix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_mutation() {
        let m = PendingMutation::create("m-1", json!({"name": "X"}), 1000);
        assert_eq!(m.kind, MutationKind::Create);
        assert_eq!(m.target_id, None);
    }

    #[test]
    fn delete_mutation_carries_target_in_payload() {
        let m = PendingMutation::delete("m-3", "user-1", 3000);
        assert_eq!(m.kind, MutationKind::Delete);
        assert_eq!(m.payload, json!({"id": "user-1"}));
        assert_eq!(m.target_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn age_saturates() {
        let m = PendingMutation::update("m-2", "user-1", json!({}), 5000);
        assert_eq!(m.age(8000), 3000);
        assert_eq!(m.age(1000), 0);
    }

    #[test]
    fn mutation_ids_are_distinct() {
        let a = generate_mutation_id(1000);
        let b = generate_mutation_id(1000);
        assert!(a.starts_with("mutation-1000-"));
        assert_ne!(a, b);
    }

    #[test]
    fn serialization_format() {
        let m = PendingMutation::update("m-2", "user-1", json!({"name": "Bob"}), 2000);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"type\":\"update\""));
        assert!(json.contains("\"targetId\":\"user-1\""));

        let create = serde_json::to_string(&PendingMutation::create("m-1", json!({}), 1)).unwrap();
        assert!(!create.contains("targetId"));
    }
}
