//! User handlers - translate requests into store calls.

use crate::error::{AppError, Result};
use crate::store::UserStore;
use serde::{Deserialize, Serialize};
use tether_engine::{Attributes, Entity, EntityId};

/// Request body for bulk delete.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<EntityId>,
}

/// Response for bulk delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    /// How many of the requested users existed and were removed
    pub deleted: usize,
}

/// List every user.
pub async fn handle_list(store: &UserStore) -> Vec<Entity> {
    let users = store.list().await;
    tracing::debug!(count = users.len(), "Listed users");
    users
}

/// Fetch one user.
pub async fn handle_get(store: &UserStore, id: &str) -> Result<Entity> {
    store.get(id).await
}

/// Create a user from the submitted fields.
pub async fn handle_create(store: &UserStore, payload: Attributes) -> Result<Entity> {
    if payload.is_empty() {
        return Err(AppError::BadRequest("user fields are required".into()));
    }
    Ok(store.create(payload).await)
}

/// Apply a partial update.
pub async fn handle_update(store: &UserStore, id: &str, changes: Attributes) -> Result<Entity> {
    store.update(id, changes).await
}

/// Delete one user.
pub async fn handle_delete(store: &UserStore, id: &str) -> Result<()> {
    store.delete(id).await
}

/// Delete several users at once.
pub async fn handle_bulk_delete(
    store: &UserStore,
    request: BulkDeleteRequest,
) -> Result<BulkDeleteResponse> {
    if request.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }
    let deleted = store.bulk_delete(&request.ids).await;
    Ok(BulkDeleteResponse { deleted })
}
