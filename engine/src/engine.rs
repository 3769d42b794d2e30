//! Mutation orchestrator.
//!
//! [`MutationEngine`] runs the optimistic-update protocol for every
//! mutation of the managed collection:
//!
//! 1. snapshot the cache state needed for rollback;
//! 2. append a [`PendingMutation`] to the persistent log;
//! 3. apply the expected effect to the cache;
//! 4. call the remote service;
//! 5. on success reconcile the cache with the server's answer;
//! 6. on failure restore the snapshot (or evict, if the target vanished);
//! 7. drop the log entry and invalidate derived state.
//!
//! All cache-mutating work is serialized through one [`SequentialLock`] so
//! two mutations never interleave their apply and rollback steps.
//!
//! Destructive bulk deletes can be routed through the [`UndoRegistry`]: the
//! entities disappear from the cache at once, but the remote delete only
//! fires when the undo window elapses.

use crate::cache::{CacheScope, EntityCache};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::conflict::{self, ConflictReport, ConflictResolution};
use crate::entity::{attributes, strip_identity};
use crate::error::{Error, Result};
use crate::lock::SequentialLock;
use crate::log::MutationLog;
use crate::mutation::{generate_mutation_id, random_suffix, MutationKind, PendingMutation};
use crate::notify::{plural, Notification, NotificationLevel, Notifier, TracingNotifier};
use crate::remote::{RemoteError, RemoteService};
use crate::snapshot::CacheSnapshot;
use crate::storage::{DurableStore, MemoryStore};
use crate::undo::{PendingUndo, UndoRegistry};
use crate::{Attributes, Entity, EntityId, MutationId, OperationId, Timestamp};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Notification key for create lifecycle messages.
pub const KEY_CREATE: &str = "create-entity";
/// Notification key for update lifecycle messages.
pub const KEY_UPDATE: &str = "update-entity";
/// Notification key for single delete lifecycle messages.
pub const KEY_DELETE: &str = "delete-entity";
/// Notification key for bulk delete lifecycle messages.
pub const KEY_BULK_DELETE: &str = "bulk-delete";
/// Notification key for boot-time replay messages.
pub const KEY_REPLAY: &str = "replay-pending";

/// Result of [`MutationEngine::update_checked`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// No conflict; the update went through and this is the server's copy.
    Updated(Entity),
    /// The entity changed out-of-band. Nothing was mutated yet.
    Conflict(ConflictReport),
}

/// Result of restoring the snapshot of an undone bulk delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    /// Ids put back into the cache
    pub restored: Vec<EntityId>,
    /// Entities that had to be re-created server-side
    pub recreated: Vec<Entity>,
    /// Ids that still existed server-side and were left alone
    pub skipped: Vec<EntityId>,
}

/// Result of replaying the persistent log at boot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub completed: Vec<MutationId>,
    pub failed: Vec<MutationId>,
}

/// Process-wide state shared by every mutation path.
struct EngineContext {
    cache: Arc<EntityCache>,
    log: MutationLog,
    undo: UndoRegistry,
    lock: SequentialLock,
    remote: Arc<dyn RemoteService>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

/// Builder for [`MutationEngine`].
pub struct EngineBuilder {
    remote: Arc<dyn RemoteService>,
    store: Arc<dyn DurableStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cache: Arc<EntityCache>,
    config: EngineConfig,
}

impl EngineBuilder {
    fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self {
            remote,
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            cache: Arc::new(EntityCache::new()),
            config: EngineConfig::default(),
        }
    }

    /// Durable slot for the mutation log (default: in-memory).
    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = store;
        self
    }

    /// Receiver of lifecycle notifications (default: `tracing`).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing cache instead of creating a fresh one.
    pub fn cache(mut self, cache: Arc<EntityCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Open the mutation log and assemble the engine.
    pub fn build(self) -> MutationEngine {
        let log = MutationLog::open(
            self.store,
            self.clock.clone(),
            self.config.queue_key.clone(),
            self.config.pending_max_age,
        );
        let undo = UndoRegistry::new(self.config.undo_window, self.clock.clone());

        MutationEngine {
            ctx: Arc::new(EngineContext {
                cache: self.cache,
                log,
                undo,
                lock: SequentialLock::new(),
                remote: self.remote,
                notifier: self.notifier,
                clock: self.clock,
                config: self.config,
            }),
        }
    }
}

/// Orchestrates optimistic mutations against a remote collection.
///
/// Cloning is cheap; clones share the same cache, log, undo registry and
/// lock. Create one engine per application process.
#[derive(Clone)]
pub struct MutationEngine {
    ctx: Arc<EngineContext>,
}

impl MutationEngine {
    /// Start building an engine around `remote`.
    pub fn builder(remote: Arc<dyn RemoteService>) -> EngineBuilder {
        EngineBuilder::new(remote)
    }

    /// The entity cache the UI reads from.
    pub fn cache(&self) -> &EntityCache {
        &self.ctx.cache
    }

    /// The persistent mutation log.
    pub fn log(&self) -> &MutationLog {
        &self.ctx.log
    }

    /// The undo registry.
    pub fn undo_registry(&self) -> &UndoRegistry {
        &self.ctx.undo
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Whether `id` is an optimistic id that the server has not confirmed.
    pub fn is_temporary(&self, id: &str) -> bool {
        id.starts_with(&self.ctx.config.temp_id_prefix)
    }

    /// Fetch the whole collection into the cache.
    pub async fn load_collection(&self) -> Result<Vec<Entity>> {
        let ctx = &self.ctx;
        ctx.lock.run(|| ctx.load_collection()).await
    }

    /// Fetch one entity into the single-entity view.
    ///
    /// If the server no longer has it, it is evicted from both views.
    pub async fn fetch_entity(&self, id: &str) -> Result<Entity> {
        let ctx = &self.ctx;
        let fetched = ctx.remote.get(id).await;

        // Cache writes queue behind in-flight mutations so a later rollback
        // cannot reinstate an entity evicted here.
        ctx.lock
            .run(move || async move {
                match fetched {
                    Ok(entity) => {
                        ctx.cache.put_entity(entity.clone());
                        ctx.cache.mark_fresh(&CacheScope::Entity(id.to_string()));
                        Ok(entity)
                    }
                    Err(RemoteError::NotFound(_)) => {
                        ctx.cache.remove(id);
                        Err(Error::EntityVanished(id.to_string()))
                    }
                    Err(e) => Err(Error::Remote(e.to_string())),
                }
            })
            .await
    }

    /// Create an entity optimistically.
    pub async fn create(&self, payload: Attributes) -> Result<Entity> {
        let ctx = &self.ctx;
        ctx.lock.run(|| ctx.create(payload)).await
    }

    /// Update an entity optimistically, without a conflict check.
    pub async fn update(&self, id: &str, changes: Attributes) -> Result<Entity> {
        let ctx = &self.ctx;
        ctx.lock.run(|| ctx.update(id, changes)).await
    }

    /// Check for an out-of-band modification first, then update.
    pub async fn update_checked(&self, id: &str, changes: Attributes) -> Result<UpdateOutcome> {
        let local = self.ctx.cache.entity_or_cached(id);
        let check = conflict::check(local.as_ref(), || self.ctx.remote.get(id)).await;

        if let (Some(client_version), Some(server_version)) = (local, check.server_copy) {
            return Ok(UpdateOutcome::Conflict(ConflictReport {
                client_version,
                server_version,
            }));
        }
        self.update(id, changes).await.map(UpdateOutcome::Updated)
    }

    /// Act on the user's choice for a detected conflict.
    ///
    /// `KeepServer` adopts the server copy into both cache views and discards
    /// `changes`; `Overwrite` submits `changes` as a forced update.
    pub async fn resolve_conflict(
        &self,
        report: ConflictReport,
        resolution: ConflictResolution,
        changes: Attributes,
    ) -> Result<Entity> {
        let id = report.server_version.id.clone();
        match resolution {
            ConflictResolution::KeepServer => {
                let ctx = &self.ctx;
                let server = report.server_version;
                ctx.lock
                    .run(|| async {
                        ctx.reconcile_entity(&id, server.clone());
                        ctx.cache.invalidate(CacheScope::Entity(id.clone()));
                    })
                    .await;
                tracing::info!(entity_id = %id, "Conflict resolved, kept server version");
                self.ctx.notify(
                    NotificationLevel::Info,
                    KEY_UPDATE,
                    "Kept the server version; your changes were discarded",
                );
                Ok(server)
            }
            ConflictResolution::Overwrite => {
                tracing::info!(entity_id = %id, "Conflict resolved, overwriting server version");
                self.update(&id, changes).await
            }
        }
    }

    /// Delete one entity optimistically.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let ctx = &self.ctx;
        ctx.lock.run(|| ctx.delete(id)).await
    }

    /// Delete several entities optimistically, with no undo window.
    pub async fn bulk_delete(&self, ids: &[EntityId]) -> Result<()> {
        let ctx = &self.ctx;
        ctx.lock.run(|| ctx.bulk_delete(ids)).await
    }

    /// Remove entities from the cache now and delete them remotely once the
    /// undo window elapses, unless [`MutationEngine::undo`] is called first.
    ///
    /// Only ids present in the cache take part. Returns the undo operation
    /// id.
    pub async fn bulk_delete_with_undo(&self, ids: &[EntityId]) -> Result<OperationId> {
        let ctx = &self.ctx;
        ctx.lock
            .run(|| async { EngineContext::bulk_delete_with_undo(ctx, ids) })
            .await
    }

    /// Undo a pending bulk delete.
    ///
    /// The snapshot goes back into the cache immediately; afterwards the
    /// server is re-queried and any entity it no longer has is re-created.
    pub async fn undo(&self, operation_id: &str) -> Result<RestoreReport> {
        // Cancel before queueing on the lock so the timer cannot fire while
        // we wait for our turn.
        let Some(snapshot) = self.ctx.undo.cancel(operation_id) else {
            return Err(Error::UnknownUndo(operation_id.to_string()));
        };
        let mutation_ids: Vec<MutationId> = snapshot
            .iter()
            .map(|e| undo_mutation_id(operation_id, &e.id))
            .collect();
        self.ctx.log.remove_many(&mutation_ids);
        tracing::info!(operation_id = %operation_id, entities = snapshot.len(), "Undoing bulk delete");

        let ctx = &self.ctx;
        ctx.lock.run(|| ctx.restore_entities(snapshot)).await
    }

    /// Pending undo operations, soonest expiry first.
    pub fn pending_undo(&self) -> Vec<PendingUndo> {
        self.ctx.undo.pending()
    }

    /// Drop every pending undo operation without committing its delete.
    ///
    /// The entities were never deleted remotely, so the collection is marked
    /// stale for the UI to refetch.
    pub fn abandon_undo(&self) {
        let pending = self.ctx.undo.pending();
        self.ctx.undo.clear_all();
        let mutation_ids: Vec<MutationId> = pending
            .iter()
            .flat_map(|op| {
                op.snapshot
                    .iter()
                    .map(move |e| undo_mutation_id(&op.id, &e.id))
            })
            .collect();
        self.ctx.log.remove_many(&mutation_ids);
        if !pending.is_empty() {
            self.ctx.cache.invalidate(CacheScope::Collection);
        }
    }

    /// Re-execute every mutation left in the persistent log by a previous
    /// process. Call once at boot, before issuing new mutations.
    ///
    /// Each entry runs exactly once and is discarded whatever the outcome.
    pub async fn replay_pending(&self) -> ReplayReport {
        let ctx = &self.ctx;
        ctx.lock.run(|| ctx.replay_pending()).await
    }
}

impl EngineContext {
    fn notify(&self, level: NotificationLevel, key: &str, message: impl Into<String>) {
        self.notifier
            .notify(Notification::new(level, message).with_key(key));
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn temp_id(&self, now: Timestamp) -> EntityId {
        format!("{}{}-{}", self.config.temp_id_prefix, now, random_suffix())
    }

    /// Narrow post-mutation invalidation: aggregates only, the collection has
    /// already been reconciled.
    fn settle(&self) {
        self.cache.invalidate(CacheScope::Aggregates);
    }

    /// Overwrite `id` in both views with the server's copy.
    fn reconcile_entity(&self, id: &str, server: Entity) {
        self.cache.update_collection(|list| {
            list.into_iter()
                .map(|e| if e.id == id { server.clone() } else { e })
                .collect()
        });
        self.cache.put_entity(server);
    }

    /// Whether `local` and `server` are the same record: same id, or same
    /// value under the configured content key. Without a content key value,
    /// all attributes must match.
    fn same_record(&self, local: &Entity, server: &Entity) -> bool {
        if local.id == server.id {
            return true;
        }
        match local.get(&self.config.content_key) {
            Some(value) if !value.is_null() => server.get(&self.config.content_key) == Some(value),
            _ => local.differing_fields(server).is_empty(),
        }
    }

    async fn load_collection(&self) -> Result<Vec<Entity>> {
        let entities = self
            .remote
            .list()
            .await
            .map_err(|e| Error::Remote(e.to_string()))?;
        self.cache.set_collection(entities);
        self.cache.mark_fresh(&CacheScope::Collection);
        Ok(self.cache.collection().unwrap_or_default())
    }

    async fn create(&self, payload: Attributes) -> Result<Entity> {
        let payload = strip_identity(payload);
        let now = self.now();
        let snapshot = CacheSnapshot::collection_only(&self.cache);

        let mutation_id = generate_mutation_id(now);
        self.log.append(PendingMutation::create(
            mutation_id.clone(),
            Value::Object(payload.clone()),
            now,
        ));

        let temp = Entity::new(self.temp_id(now), millis_to_datetime(now), payload.clone());
        let temp_id = temp.id.clone();
        self.cache.write_collection(|mut list| {
            list.push(temp);
            list
        });
        tracing::debug!(temp_id = %temp_id, mutation_id = %mutation_id, "Applied optimistic create");
        self.notify(NotificationLevel::Loading, KEY_CREATE, "Creating entity...");

        let result = self.remote.create(&payload).await;
        self.log.remove(&mutation_id);

        let outcome = match result {
            Ok(created) => {
                // Matched by temporary id; if it was dropped meanwhile, append.
                self.cache.write_collection(|list| {
                    let mut replaced = false;
                    let mut list: Vec<Entity> = list
                        .into_iter()
                        .map(|e| {
                            if e.id == temp_id {
                                replaced = true;
                                created.clone()
                            } else {
                                e
                            }
                        })
                        .collect();
                    if !replaced {
                        list.push(created.clone());
                    }
                    list
                });
                self.cache.put_entity(created.clone());
                tracing::info!(entity_id = %created.id, temp_id = %temp_id, "Create confirmed");
                self.notify(NotificationLevel::Success, KEY_CREATE, "Entity created successfully");
                Ok(created)
            }
            Err(e) => {
                snapshot.restore(&self.cache);
                tracing::warn!(temp_id = %temp_id, "Create failed, rolled back: {}", e);
                self.notify(
                    NotificationLevel::Error,
                    KEY_CREATE,
                    format!("Failed to create entity: {e}"),
                );
                Err(Error::Remote(e.to_string()))
            }
        };

        self.settle();
        outcome
    }

    async fn update(&self, id: &str, changes: Attributes) -> Result<Entity> {
        let changes = strip_identity(changes);
        let now = self.now();
        let snapshot = CacheSnapshot::capture(&self.cache, [id]);

        let mutation_id = generate_mutation_id(now);
        self.log.append(PendingMutation::update(
            mutation_id.clone(),
            id,
            Value::Object(changes.clone()),
            now,
        ));

        self.cache.update_everywhere(id, |e| e.merge(&changes));
        tracing::debug!(entity_id = %id, mutation_id = %mutation_id, "Applied optimistic update");
        self.notify(NotificationLevel::Loading, KEY_UPDATE, "Updating entity...");

        let result = self.remote.update(id, &changes).await;
        self.log.remove(&mutation_id);

        let outcome = match result {
            Ok(server) => {
                self.reconcile_entity(id, server.clone());
                tracing::info!(entity_id = %id, "Update confirmed");
                self.notify(NotificationLevel::Success, KEY_UPDATE, "Entity updated successfully");
                Ok(server)
            }
            Err(RemoteError::NotFound(_)) => {
                // Restoring a dead entity would mislead; evict it for good.
                self.cache.remove(id);
                tracing::warn!(entity_id = %id, "Update target vanished, evicted from cache");
                self.notify(
                    NotificationLevel::Error,
                    KEY_UPDATE,
                    "Entity no longer exists. It may have been deleted by another user.",
                );
                Err(Error::EntityVanished(id.to_string()))
            }
            Err(e) => {
                snapshot.restore(&self.cache);
                tracing::warn!(entity_id = %id, "Update failed, rolled back: {}", e);
                self.notify(
                    NotificationLevel::Error,
                    KEY_UPDATE,
                    format!("Failed to update entity: {e}"),
                );
                Err(Error::Remote(e.to_string()))
            }
        };

        self.settle();
        outcome
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let now = self.now();
        let snapshot = CacheSnapshot::capture(&self.cache, [id]);

        let mutation_id = generate_mutation_id(now);
        self.log
            .append(PendingMutation::delete(mutation_id.clone(), id, now));

        self.cache.remove(id);
        tracing::debug!(entity_id = %id, mutation_id = %mutation_id, "Applied optimistic delete");
        self.notify(NotificationLevel::Loading, KEY_DELETE, "Deleting entity...");

        let result = self.remote.delete(id).await;
        self.log.remove(&mutation_id);

        let outcome = match result {
            Ok(()) => {
                tracing::info!(entity_id = %id, "Delete confirmed");
                self.notify(NotificationLevel::Success, KEY_DELETE, "Entity deleted successfully");
                Ok(())
            }
            Err(RemoteError::NotFound(_)) => {
                tracing::info!(entity_id = %id, "Delete target already gone");
                self.notify(NotificationLevel::Info, KEY_DELETE, "Entity was already deleted");
                Ok(())
            }
            Err(e) => {
                snapshot.restore(&self.cache);
                tracing::warn!(entity_id = %id, "Delete failed, rolled back: {}", e);
                self.notify(
                    NotificationLevel::Error,
                    KEY_DELETE,
                    format!("Failed to delete entity: {e}"),
                );
                Err(Error::Remote(e.to_string()))
            }
        };

        self.settle();
        outcome
    }

    async fn bulk_delete(&self, ids: &[EntityId]) -> Result<()> {
        if ids.is_empty() {
            self.notify(NotificationLevel::Error, KEY_BULK_DELETE, "No entities to delete");
            return Err(Error::NothingToDelete);
        }

        let now = self.now();
        let snapshot = CacheSnapshot::capture(&self.cache, ids.iter().map(String::as_str));

        let mutation_ids: Vec<MutationId> = ids
            .iter()
            .map(|id| {
                let mutation_id = generate_mutation_id(now);
                self.log
                    .append(PendingMutation::delete(mutation_id.clone(), id, now));
                mutation_id
            })
            .collect();

        for id in ids {
            self.cache.remove(id);
        }
        let count = plural(ids.len(), "entity", "entities");
        self.notify(
            NotificationLevel::Loading,
            KEY_BULK_DELETE,
            format!("Deleting {count}..."),
        );

        let result = self.remote.bulk_delete(ids).await;
        self.log.remove_many(&mutation_ids);

        let outcome = match result {
            Ok(()) => {
                tracing::info!(count = ids.len(), "Bulk delete confirmed");
                self.notify(
                    NotificationLevel::Success,
                    KEY_BULK_DELETE,
                    format!("{count} deleted successfully"),
                );
                Ok(())
            }
            Err(e) => {
                snapshot.restore(&self.cache);
                tracing::warn!(count = ids.len(), "Bulk delete failed, rolled back: {}", e);
                self.notify(
                    NotificationLevel::Error,
                    KEY_BULK_DELETE,
                    format!("Failed to delete entities: {e}"),
                );
                Err(Error::Remote(e.to_string()))
            }
        };

        self.settle();
        outcome
    }

    fn bulk_delete_with_undo(ctx: &Arc<Self>, ids: &[EntityId]) -> Result<OperationId> {
        let removed =
            CacheSnapshot::capture(&ctx.cache, ids.iter().map(String::as_str)).entities_for(ids);

        if removed.is_empty() {
            ctx.notify(NotificationLevel::Error, KEY_BULK_DELETE, "No entities to delete");
            return Err(Error::NothingToDelete);
        }

        let now = ctx.now();
        let operation_id = format!("bulk-delete-{}-{}", now, random_suffix());
        let target_ids: Vec<EntityId> = removed.iter().map(|e| e.id.clone()).collect();

        // Logged so a restart inside the window still completes the delete
        // the user saw happen.
        for id in &target_ids {
            ctx.log.append(PendingMutation::delete(
                undo_mutation_id(&operation_id, id),
                id,
                now,
            ));
        }
        for id in &target_ids {
            ctx.cache.remove(id);
        }

        let count = plural(target_ids.len(), "entity", "entities");
        let commit_ctx = Arc::clone(ctx);
        let commit_id = operation_id.clone();
        let commit_snapshot = removed.clone();
        ctx.undo.start(operation_id.clone(), removed, move || async move {
            let ctx = commit_ctx;
            ctx.lock
                .run(|| ctx.commit_bulk_delete(&commit_id, &target_ids, commit_snapshot))
                .await;
        });

        tracing::info!(operation_id = %operation_id, "Bulk delete pending undo window");
        ctx.notify(
            NotificationLevel::Info,
            KEY_BULK_DELETE,
            format!("{count} deleted. Undo?"),
        );
        Ok(operation_id)
    }

    async fn commit_bulk_delete(&self, operation_id: &str, ids: &[EntityId], snapshot: Vec<Entity>) {
        let mutation_ids: Vec<MutationId> = ids
            .iter()
            .map(|id| undo_mutation_id(operation_id, id))
            .collect();
        let count = plural(ids.len(), "entity", "entities");

        match self.remote.bulk_delete(ids).await {
            Ok(()) => {
                self.log.remove_many(&mutation_ids);
                tracing::info!(operation_id = %operation_id, "Bulk delete committed");
                self.cache.invalidate(CacheScope::Collection);
                self.notify(
                    NotificationLevel::Success,
                    KEY_BULK_DELETE,
                    format!("{count} permanently deleted"),
                );
            }
            Err(e) => {
                self.log.remove_many(&mutation_ids);
                tracing::warn!(operation_id = %operation_id, "Bulk delete commit failed: {}", e);
                self.notify(
                    NotificationLevel::Error,
                    KEY_BULK_DELETE,
                    "Failed to permanently delete entities",
                );
                // Outcome is fully reported through notifications.
                let _ = self.restore_entities(snapshot).await;
            }
        }
        self.settle();
    }

    async fn restore_entities(&self, entities: Vec<Entity>) -> Result<RestoreReport> {
        let restored: Vec<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
        self.cache.update_collection(|mut list| {
            for entity in &entities {
                if !list.iter().any(|e| e.id == entity.id) {
                    list.push(entity.clone());
                }
            }
            list
        });
        for entity in &entities {
            self.cache.put_entity(entity.clone());
        }

        // Re-query first: never resurrect something that already exists.
        let fresh = match self.remote.list().await {
            Ok(fresh) => fresh,
            Err(e) => return Err(self.restore_failed(e)),
        };
        let (existing, missing): (Vec<Entity>, Vec<Entity>) = entities
            .into_iter()
            .partition(|e| fresh.iter().any(|f| self.same_record(e, f)));

        let mut recreated = Vec::with_capacity(missing.len());
        for entity in missing {
            match self.remote.create(&entity.attributes).await {
                Ok(created) => {
                    self.cache.update_collection(|list| {
                        list.into_iter()
                            .map(|e| if e.id == entity.id { created.clone() } else { e })
                            .collect()
                    });
                    self.cache.write_entity(&entity.id, |_| None);
                    self.cache.put_entity(created.clone());
                    recreated.push(created);
                }
                Err(e) => return Err(self.restore_failed(e)),
            }
        }

        self.cache.invalidate(CacheScope::Collection);
        if recreated.is_empty() {
            self.notify(
                NotificationLevel::Info,
                KEY_BULK_DELETE,
                "Entities already exist, no restoration needed",
            );
        } else {
            self.notify(
                NotificationLevel::Success,
                KEY_BULK_DELETE,
                format!("{} restored", plural(recreated.len(), "entity", "entities")),
            );
        }

        Ok(RestoreReport {
            restored,
            recreated,
            skipped: existing.into_iter().map(|e| e.id).collect(),
        })
    }

    fn restore_failed(&self, e: RemoteError) -> Error {
        tracing::warn!("Restore after undo failed: {}", e);
        self.cache.invalidate(CacheScope::Collection);
        self.notify(
            NotificationLevel::Error,
            KEY_BULK_DELETE,
            "Failed to restore entities. They may have been permanently deleted.",
        );
        Error::Remote(e.to_string())
    }

    async fn replay_pending(&self) -> ReplayReport {
        let mut report = ReplayReport::default();

        for mutation in self.log.list() {
            let result = self.replay_one(&mutation).await;
            self.log.remove(&mutation.id);

            match result {
                Ok(()) => {
                    tracing::info!(mutation_id = %mutation.id, kind = %mutation.kind, "Replayed pending mutation");
                    self.cache.invalidate(CacheScope::Collection);
                    self.notify(
                        NotificationLevel::Success,
                        KEY_REPLAY,
                        format!("Pending {} completed", mutation.kind),
                    );
                    report.completed.push(mutation.id);
                }
                Err(e) => {
                    tracing::warn!(mutation_id = %mutation.id, kind = %mutation.kind, "Discarding pending mutation after failed replay: {}", e);
                    self.notify(
                        NotificationLevel::Warning,
                        KEY_REPLAY,
                        format!("Failed to complete pending {} operation", mutation.kind),
                    );
                    report.failed.push(mutation.id);
                }
            }
        }

        report
    }

    async fn replay_one(&self, mutation: &PendingMutation) -> std::result::Result<(), RemoteError> {
        let target = || {
            mutation
                .target_id
                .as_deref()
                .ok_or_else(|| RemoteError::failure("pending mutation has no target id"))
        };

        match mutation.kind {
            MutationKind::Create => {
                let payload = strip_identity(attributes(mutation.payload.clone()));
                self.remote.create(&payload).await.map(|_| ())
            }
            MutationKind::Update => {
                let id = target()?;
                let changes = strip_identity(attributes(mutation.payload.clone()));
                self.remote.update(id, &changes).await.map(|_| ())
            }
            MutationKind::Delete => match self.remote.delete(target()?).await {
                Err(e) if e.is_not_found() => Ok(()),
                other => other,
            },
        }
    }
}

/// Log entry id for one entity of an undoable bulk delete.
fn undo_mutation_id(operation_id: &str, entity_id: &str) -> MutationId {
    format!("{operation_id}:{entity_id}")
}

fn millis_to_datetime(millis: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis as i64).unwrap_or_else(Utc::now)
}
