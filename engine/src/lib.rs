//! # Tether Engine
//!
//! Client-side optimistic mutation engine for a remotely stored collection.
//!
//! The engine keeps an in-memory cache of entities responsive to edits while
//! the authoritative copy lives behind an asynchronous remote service. Every
//! edit is applied to the cache immediately and reconciled with the server's
//! answer afterwards, or rolled back if the server refuses it.
//!
//! ## Core Concepts
//!
//! ### Cache
//!
//! [`EntityCache`] holds the ordered collection view and the single-entity
//! view. Writes are whole-value replacements; invalidations are broadcast to
//! subscribers so a UI layer can refetch.
//!
//! ### Mutation log
//!
//! [`MutationLog`] persists in-flight mutations through a [`DurableStore`] so
//! a restart can replay them with [`MutationEngine::replay_pending`]. Entries
//! older than the configured max age are dropped on read.
//!
//! ### Orchestration
//!
//! [`MutationEngine`] runs snapshot, log, apply, call, reconcile or rollback
//! for create, update, delete and bulk delete, all serialized through a
//! [`SequentialLock`].
//!
//! ### Undo
//!
//! [`MutationEngine::bulk_delete_with_undo`] hides entities at once and
//! defers the remote delete for the undo window (5 s by default);
//! [`MutationEngine::undo`] restores them.
//!
//! ### Conflicts
//!
//! [`MutationEngine::update_checked`] compares the local snapshot with the
//! server copy before submitting and returns a [`ConflictReport`] instead of
//! overwriting someone else's change.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use serde_json::json;
//! use tether_engine::{entity::attributes, CacheScope, Entity, EntityCache};
//!
//! let cache = EntityCache::new();
//! cache.set_collection(vec![Entity::new(
//!     "user-1",
//!     Utc::now(),
//!     attributes(json!({"name": "Alice", "email": "alice@example.com"})),
//! )]);
//!
//! cache.update_everywhere("user-1", |e| e.merge(&attributes(json!({"name": "Alicia"}))));
//! assert_eq!(cache.collection().unwrap()[0].get("name"), Some(&json!("Alicia")));
//!
//! cache.invalidate(CacheScope::Collection);
//! assert!(cache.is_stale(&CacheScope::Collection));
//! ```
//!
//! ## Transport
//!
//! With the default `http` feature, [`http::HttpRemote`] talks JSON over
//! HTTP to a `tether-server`. Any other transport implements
//! [`RemoteService`].

pub mod cache;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod entity;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod lock;
pub mod log;
pub mod mutation;
pub mod notify;
pub mod remote;
pub mod snapshot;
pub mod storage;
pub mod undo;

// Re-export main types at crate root
pub use cache::{CacheScope, EntityCache, ListenerId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use conflict::{ConflictCheck, ConflictReport, ConflictResolution};
pub use engine::{EngineBuilder, MutationEngine, ReplayReport, RestoreReport, UpdateOutcome};
pub use entity::Entity;
pub use error::{Error, Result, StorageError};
pub use lock::SequentialLock;
pub use log::MutationLog;
pub use mutation::{MutationKind, PendingMutation};
pub use notify::{Notification, NotificationLevel, Notifier, TracingNotifier};
pub use remote::{RemoteError, RemoteResult, RemoteService};
pub use snapshot::CacheSnapshot;
pub use storage::{DurableStore, FileStore, MemoryStore};
pub use undo::{PendingUndo, UndoRegistry};

/// Type aliases for clarity
pub type EntityId = String;
pub type MutationId = String;
pub type OperationId = String;
pub type Timestamp = u64;
pub type Attributes = serde_json::Map<String, serde_json::Value>;
