//! Remote service boundary.
//!
//! The engine treats the remote data service as an opaque asynchronous CRUD
//! API. Any transport works as long as it can tell "the target does not
//! exist" apart from every other failure.

use crate::{Attributes, Entity, EntityId};
use async_trait::async_trait;

/// Failures reported by a [`RemoteService`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server has no entity with this id.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// Network failure, server error, or anything else.
    #[error("{0}")]
    Failure(String),
}

impl RemoteError {
    pub fn failure(message: impl Into<String>) -> Self {
        RemoteError::Failure(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Asynchronous CRUD collaborator holding the authoritative collection.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// The whole collection in server order.
    async fn list(&self) -> RemoteResult<Vec<Entity>>;

    /// A single entity.
    async fn get(&self, id: &str) -> RemoteResult<Entity>;

    /// Create an entity; the server assigns `id` and `createdAt`.
    async fn create(&self, payload: &Attributes) -> RemoteResult<Entity>;

    /// Shallow-merge `payload` into an existing entity.
    async fn update(&self, id: &str, payload: &Attributes) -> RemoteResult<Entity>;

    /// Delete one entity.
    async fn delete(&self, id: &str) -> RemoteResult<()>;

    /// Delete several entities in one call.
    async fn bulk_delete(&self, ids: &[EntityId]) -> RemoteResult<()>;
}
