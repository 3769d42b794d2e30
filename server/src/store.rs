//! In-memory user store.
//!
//! Users are kept in insertion order behind an async `RwLock`. Every call
//! sleeps for the configured latency first so clients see realistic
//! round-trip times.

use crate::error::{AppError, Result};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde_json::json;
use std::time::Duration;
use tether_engine::entity::{attributes, strip_identity};
use tether_engine::{Attributes, Entity, EntityId};
use tokio::sync::RwLock;

/// Ordered collection of users.
pub struct UserStore {
    users: RwLock<Vec<Entity>>,
    latency: Duration,
    bulk_latency: Duration,
}

impl UserStore {
    /// Create a store holding `users`.
    pub fn new(users: Vec<Entity>, latency: Duration, bulk_latency: Duration) -> Self {
        Self {
            users: RwLock::new(users),
            latency,
            bulk_latency,
        }
    }

    /// All users in insertion order.
    pub async fn list(&self) -> Vec<Entity> {
        self.delay(self.latency).await;
        self.users.read().await.clone()
    }

    /// One user by id.
    pub async fn get(&self, id: &str) -> Result<Entity> {
        self.delay(self.latency).await;
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Add a user. The store assigns `id` and `createdAt`.
    pub async fn create(&self, payload: Attributes) -> Entity {
        self.delay(self.latency).await;
        let user = Entity::new(
            format!("user-{}", uuid::Uuid::new_v4()),
            Utc::now(),
            strip_identity(payload),
        );
        self.users.write().await.push(user.clone());
        tracing::info!(user_id = %user.id, "Created user");
        user
    }

    /// Shallow-merge `changes` into an existing user.
    pub async fn update(&self, id: &str, changes: Attributes) -> Result<Entity> {
        self.delay(self.latency).await;
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        *user = user.merge(&changes);
        tracing::info!(user_id = %id, "Updated user");
        Ok(user.clone())
    }

    /// Remove one user.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delay(self.latency).await;
        let mut users = self.users.write().await;
        let index = users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        users.remove(index);
        tracing::info!(user_id = %id, "Deleted user");
        Ok(())
    }

    /// Remove every listed user. Unknown ids are ignored.
    ///
    /// Returns how many users were removed.
    pub async fn bulk_delete(&self, ids: &[EntityId]) -> usize {
        self.delay(self.bulk_latency).await;
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| !ids.contains(&u.id));
        let removed = before - users.len();
        tracing::info!(requested = ids.len(), removed, "Bulk deleted users");
        removed
    }

    /// Number of users, without simulated latency.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn delay(&self, latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

const FIRST_NAMES: [&str; 17] = [
    "Alice", "Carlos", "Diana", "Ethan", "Fatima", "George", "Hana", "Ivan", "Julia", "Kenji",
    "Laura", "Mateo", "Nina", "Omar", "Priya", "Quinn", "Rosa",
];

const LAST_NAMES: [&str; 17] = [
    "Walker", "Garcia", "Prince", "Hunt", "Khan", "Miller", "Sato", "Petrov", "Rossi", "Tanaka",
    "Schmidt", "Lopez", "Novak", "Haddad", "Patel", "Murphy", "Silva",
];

const ROLES: [&str; 5] = ["Admin", "Editor", "Viewer", "Manager", "Developer"];

/// The fixed demo data set: three named users followed by seventeen
/// generated ones. Deterministic across runs.
pub fn seed_users() -> Vec<Entity> {
    let epoch = Utc
        .with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    let mut users = vec![
        seed_user(
            1,
            epoch,
            "John Doe",
            "john.doe@example.com",
            "Admin",
            true,
            "Senior administrator with full system access",
        ),
        seed_user(
            2,
            epoch,
            "Jane Smith",
            "jane.smith@example.com",
            "Manager",
            true,
            "Team lead managing development projects",
        ),
        seed_user(3, epoch, "Bob Johnson", "bob.johnson@example.com", "Developer", true, ""),
    ];

    for (i, (first, last)) in FIRST_NAMES.iter().zip(LAST_NAMES.iter()).enumerate() {
        let n = i + 4;
        let email = format!("{}.{}@example.com", first, last).to_lowercase();
        users.push(seed_user(
            n,
            epoch,
            &format!("{first} {last}"),
            &email,
            ROLES[i % ROLES.len()],
            // Roughly one in seven generated users is inactive.
            i % 7 != 3,
            "",
        ));
    }
    users
}

fn seed_user(
    n: usize,
    epoch: DateTime<Utc>,
    name: &str,
    email: &str,
    role: &str,
    active: bool,
    bio: &str,
) -> Entity {
    Entity::new(
        format!("user-seed-{n:02}"),
        epoch + ChronoDuration::days(n as i64 * 11),
        attributes(json!({
            "name": name,
            "email": email,
            "phoneNumber": format!("+1 (555) {:03}-{:04}", 100 + n, 1000 + n * 37),
            "avatar": format!("https://i.pravatar.cc/150?u={email}"),
            "active": active,
            "role": role,
            "bio": bio,
        })),
    )
}
