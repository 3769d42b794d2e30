//! Engine configuration.

use std::env;
use std::time::Duration;

/// Default delay between a reversible destructive action and its commit.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(5);

/// Default age after which a queued mutation is discarded unexecuted.
pub const DEFAULT_PENDING_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Default durable slot holding the mutation queue.
pub const DEFAULT_QUEUE_KEY: &str = "pending-mutations";

/// Tunables for a [`MutationEngine`](crate::MutationEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a bulk delete can be undone before it is committed remotely
    pub undo_window: Duration,
    /// Staleness window of the persistent mutation log
    pub pending_max_age: Duration,
    /// Durable slot name for the mutation log
    pub queue_key: String,
    /// Prefix marking optimistic, not-yet-durable entity ids
    pub temp_id_prefix: String,
    /// Attribute used to recognise an entity that already exists server-side
    /// when restoring after an undo
    pub content_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_window: DEFAULT_UNDO_WINDOW,
            pending_max_age: DEFAULT_PENDING_MAX_AGE,
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            temp_id_prefix: "temp-".to_string(),
            content_key: "email".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let undo_window = millis_var("TETHER_UNDO_WINDOW_MS")?.unwrap_or(defaults.undo_window);
        let pending_max_age =
            millis_var("TETHER_PENDING_MAX_AGE_MS")?.unwrap_or(defaults.pending_max_age);
        let queue_key = env::var("TETHER_QUEUE_KEY").unwrap_or(defaults.queue_key);
        let content_key = env::var("TETHER_CONTENT_KEY").unwrap_or(defaults.content_key);

        Ok(Self {
            undo_window,
            pending_max_age,
            queue_key,
            temp_id_prefix: defaults.temp_id_prefix,
            content_key,
        })
    }

    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo_window = window;
        self
    }

    pub fn with_pending_max_age(mut self, max_age: Duration) -> Self {
        self.pending_max_age = max_age;
        self
    }

    pub fn with_content_key(mut self, key: impl Into<String>) -> Self {
        self.content_key = key.into();
        self
    }
}

fn millis_var(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidDuration { name, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name} value: {value:?} (expected milliseconds)")]
    InvalidDuration { name: &'static str, value: String },
}
