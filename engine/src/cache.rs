//! Entity cache - the in-memory source of truth for the UI.
//!
//! The cache holds two co-located views of the managed collection:
//!
//! - the **collection view**: an ordered list (server arrival order) with at
//!   most one entity per id, `None` until the collection has been loaded;
//! - the **entity view**: individually fetched entities keyed by id.
//!
//! Every write is a total replacement computed from the previous value, so
//! readers never observe a partially applied edit. Reads never block on
//! remote work.
//!
//! Consumers learn about staleness through [`EntityCache::subscribe`]; the
//! cache itself never refetches.

use crate::{Entity, EntityId};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A region of cached state that can be invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// The ordered collection view
    Collection,
    /// A single entity view
    Entity(EntityId),
    /// Derived or aggregate state computed from the collection
    Aggregates,
}

/// Listener ID returned by [`EntityCache::subscribe`].
pub type ListenerId = u64;

type Listener = dyn Fn(&CacheScope) + Send + Sync;

/// Keyed store of the collection and of individual entities.
pub struct EntityCache {
    collection: RwLock<Option<Vec<Entity>>>,
    entities: RwLock<HashMap<EntityId, Entity>>,
    stale: Mutex<HashSet<CacheScope>>,
    listeners: Mutex<Vec<(ListenerId, Arc<Listener>)>>,
    next_listener: AtomicU64,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    /// Create an empty cache with the collection not yet loaded.
    pub fn new() -> Self {
        Self {
            collection: RwLock::new(None),
            entities: RwLock::new(HashMap::new()),
            stale: Mutex::new(HashSet::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// The collection view, `None` if never loaded.
    pub fn collection(&self) -> Option<Vec<Entity>> {
        self.collection.read().clone()
    }

    /// The single-entity view for `id`.
    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.entities.read().get(id).cloned()
    }

    /// The single-entity view for `id`, falling back to the collection view.
    pub fn entity_or_cached(&self, id: &str) -> Option<Entity> {
        self.entity(id).or_else(|| {
            self.collection
                .read()
                .as_ref()
                .and_then(|list| list.iter().find(|e| e.id == id).cloned())
        })
    }

    /// Number of entities in the collection view.
    pub fn len(&self) -> usize {
        self.collection.read().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the collection view wholesale. Duplicate ids keep their first
    /// occurrence.
    pub fn set_collection(&self, entities: Vec<Entity>) {
        *self.collection.write() = Some(dedup(entities));
    }

    /// Replace the collection view with `f(old)`. An unloaded collection is
    /// passed to `f` as an empty list.
    pub fn write_collection(&self, f: impl FnOnce(Vec<Entity>) -> Vec<Entity>) {
        let mut slot = self.collection.write();
        let old = slot.take().unwrap_or_default();
        *slot = Some(dedup(f(old)));
    }

    /// Replace the collection view with `f(old)` only if it has been loaded.
    pub fn update_collection(&self, f: impl FnOnce(Vec<Entity>) -> Vec<Entity>) {
        let mut slot = self.collection.write();
        if let Some(old) = slot.take() {
            *slot = Some(dedup(f(old)));
        }
    }

    /// Replace the entity view for `id` with `f(old)`. Returning `None`
    /// removes it.
    pub fn write_entity(&self, id: &str, f: impl FnOnce(Option<Entity>) -> Option<Entity>) {
        let mut entities = self.entities.write();
        let old = entities.remove(id);
        if let Some(new) = f(old) {
            entities.insert(id.to_string(), new);
        }
    }

    /// Set the entity view for an entity's own id.
    pub fn put_entity(&self, entity: Entity) {
        self.entities.write().insert(entity.id.clone(), entity);
    }

    /// Replace the entity with `id` in both views by `f(old)`, where present.
    pub fn update_everywhere(&self, id: &str, f: impl Fn(&Entity) -> Entity) {
        self.update_collection(|list| {
            list.into_iter()
                .map(|e| if e.id == id { f(&e) } else { e })
                .collect()
        });
        self.write_entity(id, |old| old.map(|e| f(&e)));
    }

    /// Remove `id` from both views.
    pub fn remove(&self, id: &str) {
        self.update_collection(|list| list.into_iter().filter(|e| e.id != id).collect());
        self.entities.write().remove(id);
    }

    /// Forget the collection view, as if it had never been loaded.
    pub fn unload_collection(&self) {
        *self.collection.write() = None;
    }

    /// Drop both views.
    pub fn clear(&self) {
        *self.collection.write() = None;
        self.entities.write().clear();
    }

    /// Mark `scope` stale and notify subscribers.
    pub fn invalidate(&self, scope: CacheScope) {
        self.stale.lock().insert(scope.clone());
        tracing::debug!(scope = ?scope, "Invalidated cache scope");

        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<_> = self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&scope);
        }
    }

    /// Whether `scope` was invalidated and not refreshed since.
    pub fn is_stale(&self, scope: &CacheScope) -> bool {
        self.stale.lock().contains(scope)
    }

    /// Clear the stale mark on `scope`.
    pub fn mark_fresh(&self, scope: &CacheScope) {
        self.stale.lock().remove(scope);
    }

    /// Register a listener called on every invalidation.
    pub fn subscribe(&self, listener: impl Fn(&CacheScope) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }
}

fn dedup(entities: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::with_capacity(entities.len());
    entities
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}
