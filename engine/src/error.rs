//! Error types for the Tether engine.

use crate::EntityId;
use thiserror::Error;

/// Terminal outcomes of an orchestrated mutation.
///
/// Every variant leaves the cache in a defined state: rolled back for
/// [`Error::Remote`], evicted for [`Error::EntityVanished`], untouched for
/// the rest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("remote operation failed: {0}")]
    Remote(String),

    #[error("entity no longer exists: {0}")]
    EntityVanished(EntityId),

    #[error("no entities to delete")]
    NothingToDelete,

    #[error("unknown or expired undo operation: {0}")]
    UnknownUndo(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
