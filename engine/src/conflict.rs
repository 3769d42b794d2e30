//! Conflict detection for out-of-band modifications.
//!
//! Before an edit is submitted, the locally held snapshot of the entity is
//! compared with the server's current copy. Every mutable field takes part,
//! including ones the user did not touch; identity (`id`) and `createdAt`
//! are excluded.
//!
//! Resolution is never automatic. The caller receives both versions in a
//! [`ConflictReport`] and picks a [`ConflictResolution`].
//!
//! If the server copy cannot be fetched the detector fails open and reports
//! no conflict, so an unreachable server never blocks an edit.

use crate::{remote::RemoteResult, Entity};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// How the user chose to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    /// Discard the local edit and adopt the server version
    KeepServer,
    /// Submit the local edit anyway as a forced update
    Overwrite,
}

/// Both sides of a detected conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// The snapshot the user was editing
    pub client_version: Entity,
    /// The server's current copy
    pub server_version: Entity,
}

impl ConflictReport {
    /// Mutable fields whose values differ, sorted.
    pub fn changed_fields(&self) -> Vec<String> {
        self.client_version.differing_fields(&self.server_version)
    }
}

/// Outcome of a conflict check.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    /// Present only when `has_conflict` is true
    pub server_copy: Option<Entity>,
}

impl ConflictCheck {
    fn none() -> Self {
        Self {
            has_conflict: false,
            server_copy: None,
        }
    }
}

/// Whether `server` differs from `local` in any mutable field.
pub fn detect_conflict(local: &Entity, server: &Entity) -> bool {
    !local.differing_fields(server).is_empty()
}

/// Compare `local` against the server copy returned by `fetch`.
///
/// `fetch` is not called when there is no local snapshot.
pub async fn check<F, Fut>(local: Option<&Entity>, fetch: F) -> ConflictCheck
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = RemoteResult<Entity>>,
{
    let Some(local) = local else {
        return ConflictCheck::none();
    };

    match fetch().await {
        Ok(server) if detect_conflict(local, &server) => {
            tracing::info!(
                entity_id = %local.id,
                fields = ?local.differing_fields(&server),
                "Concurrent modification detected"
            );
            ConflictCheck {
                has_conflict: true,
                server_copy: Some(server),
            }
        }
        Ok(_) => ConflictCheck::none(),
        Err(e) => {
            tracing::warn!(entity_id = %local.id, "Conflict check skipped, fetch failed: {}", e);
            ConflictCheck::none()
        }
    }
}
