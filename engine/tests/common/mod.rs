//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tether_engine::entity::attributes;
use tether_engine::{
    Attributes, DurableStore, EngineConfig, Entity, EntityId, ManualClock, MemoryStore,
    MutationEngine, Notification, NotificationLevel, Notifier, RemoteError, RemoteResult,
    RemoteService,
};

/// Remote calls, in the order the engine issued them.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Get(EntityId),
    Create(Attributes),
    Update(EntityId, Attributes),
    Delete(EntityId),
    BulkDelete(Vec<EntityId>),
}

/// Which remote operation a failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
    BulkDelete,
}

#[derive(Default)]
struct MockState {
    entities: Vec<Entity>,
    next_id: u64,
    failures: HashMap<Op, String>,
    calls: Vec<Call>,
}

/// In-memory remote service with failure injection and call recording.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<MockState>,
    latency: Mutex<Duration>,
}

impl MockRemote {
    pub fn seeded(entities: Vec<Entity>) -> Arc<Self> {
        let remote = Self::default();
        {
            let mut state = remote.state.lock();
            state.next_id = entities.len() as u64 + 1;
            state.entities = entities;
        }
        Arc::new(remote)
    }

    /// Make every call to `op` fail until [`MockRemote::heal`].
    pub fn fail(&self, op: Op, message: &str) {
        self.state.lock().failures.insert(op, message.to_string());
    }

    pub fn heal(&self, op: Op) {
        self.state.lock().failures.remove(&op);
    }

    /// Delay every call by `latency` (respects paused Tokio time).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn bulk_delete_calls(&self) -> Vec<Vec<EntityId>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::BulkDelete(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.state.lock().entities.clone()
    }

    /// Simulate another client changing an entity.
    pub fn put_out_of_band(&self, entity: Entity) {
        let mut state = self.state.lock();
        match state.entities.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => *existing = entity,
            None => state.entities.push(entity),
        }
    }

    /// Simulate another client deleting an entity.
    pub fn remove_out_of_band(&self, id: &str) {
        self.state.lock().entities.retain(|e| e.id != id);
    }

    async fn enter(&self, op: Op, call: Call) -> RemoteResult<()> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.get(&op) {
            Some(message) => Err(RemoteError::failure(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn list(&self) -> RemoteResult<Vec<Entity>> {
        self.enter(Op::List, Call::List).await?;
        Ok(self.entities())
    }

    async fn get(&self, id: &str) -> RemoteResult<Entity> {
        self.enter(Op::Get, Call::Get(id.to_string())).await?;
        self.state
            .lock()
            .entities
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn create(&self, payload: &Attributes) -> RemoteResult<Entity> {
        self.enter(Op::Create, Call::Create(payload.clone())).await?;
        let mut state = self.state.lock();
        let entity = Entity::new(
            format!("user-{}", state.next_id),
            created_at(),
            payload.clone(),
        );
        state.next_id += 1;
        state.entities.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: &str, payload: &Attributes) -> RemoteResult<Entity> {
        self.enter(Op::Update, Call::Update(id.to_string(), payload.clone()))
            .await?;
        let mut state = self.state.lock();
        let entity = state
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        *entity = normalize(entity.merge(payload));
        Ok(entity.clone())
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        self.enter(Op::Delete, Call::Delete(id.to_string())).await?;
        let mut state = self.state.lock();
        let before = state.entities.len();
        state.entities.retain(|e| e.id != id);
        if state.entities.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn bulk_delete(&self, ids: &[EntityId]) -> RemoteResult<()> {
        self.enter(Op::BulkDelete, Call::BulkDelete(ids.to_vec()))
            .await?;
        self.state
            .lock()
            .entities
            .retain(|e| !ids.contains(&e.id));
        Ok(())
    }
}

/// Server-side canonicalisation applied on update: emails are stored
/// lowercase.
fn normalize(mut entity: Entity) -> Entity {
    if let Some(Value::String(email)) = entity.attributes.get_mut("email") {
        *email = email.to_lowercase();
    }
    entity
}

/// Notifier that keeps everything it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    pub fn messages(&self, level: NotificationLevel) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }

    pub fn last(&self) -> Option<Notification> {
        self.received.lock().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().push(notification);
    }
}

pub fn created_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
}

pub fn user(id: &str, name: &str, email: &str) -> Entity {
    Entity::new(
        id,
        created_at(),
        attributes(json!({
            "name": name,
            "email": email,
            "phoneNumber": "+1-555-0100",
            "role": "Developer",
            "active": true,
        })),
    )
}

pub fn seed() -> Vec<Entity> {
    vec![
        user("user-1", "John Doe", "john.doe@example.com"),
        user("user-2", "Jane Smith", "jane.smith@example.com"),
        user("user-3", "Bob Johnson", "bob.johnson@example.com"),
    ]
}

pub fn changes(value: Value) -> Attributes {
    attributes(value)
}

pub fn ids(entities: &[Entity]) -> Vec<&str> {
    entities.iter().map(|e| e.id.as_str()).collect()
}

pub const START: u64 = 1_700_000_000_000;

/// An engine wired to a seeded mock remote.
pub struct Harness {
    pub engine: MutationEngine,
    pub remote: Arc<MockRemote>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<dyn DurableStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn DurableStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn DurableStore>, config: EngineConfig) -> Self {
        let remote = MockRemote::seeded(seed());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(START));
        let engine = MutationEngine::builder(remote.clone())
            .store(store.clone())
            .notifier(notifier.clone())
            .clock(clock.clone())
            .config(config)
            .build();
        Self {
            engine,
            remote,
            notifier,
            clock,
            store,
        }
    }

    /// A harness whose collection view is already loaded.
    pub async fn loaded() -> Self {
        let harness = Self::new();
        harness.engine.load_collection().await.unwrap();
        harness
    }

    pub fn collection_ids(&self) -> Vec<String> {
        self.engine
            .cache()
            .collection()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.id)
            .collect()
    }
}
