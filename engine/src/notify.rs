//! Lifecycle notifications for the presentation layer.
//!
//! Notifications are fire-and-forget: the engine never inspects what a
//! [`Notifier`] does with them.

use serde::Serialize;

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Loading,
    Success,
    Info,
    Warning,
    Error,
}

/// A human-readable lifecycle message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    /// Groups related messages so a later one can replace an earlier one
    /// (e.g. a loading message replaced by its success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            key: None,
            message: message.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Receiver of lifecycle notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes every notification to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        let key = n.key.as_deref().unwrap_or("-");
        match n.level {
            NotificationLevel::Loading => tracing::debug!(key, "{}", n.message),
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(key, "{}", n.message)
            }
            NotificationLevel::Warning => tracing::warn!(key, "{}", n.message),
            NotificationLevel::Error => tracing::error!(key, "{}", n.message),
        }
    }
}

/// `count` followed by the singular or plural noun.
pub(crate) fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}
