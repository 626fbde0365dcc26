//! Success/error messages, including ones that survive one navigation.
//!
//! `show` is the transient toast: it clears itself after its duration.
//! `persist` writes a timestamped envelope to the key-value store under
//! [`FLASH_KEY`] so the next screen (or the next process) can pick it up with
//! `consume_persisted`. A persisted notification is handed out at most once
//! and only within its own expiry window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use petadmin_shared::ApiError;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::storage::{self, KeyValueStore};

pub const FLASH_KEY: &str = "flashNotification";
pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);
pub const DEFAULT_FLASH_TTL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Envelope stored as `{message, type, timestamp}`; `timestamp` is epoch ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: i64,
}

impl Notification {
    pub fn new(message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            message: message.into(),
            kind,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

struct Active {
    notification: Notification,
    expires_at: Instant,
}

pub struct NotificationBridge {
    store: Arc<dyn KeyValueStore>,
    flash_ttl: Duration,
    active: Mutex<Option<Active>>,
}

impl NotificationBridge {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_flash_ttl(store, DEFAULT_FLASH_TTL)
    }

    pub fn with_flash_ttl(store: Arc<dyn KeyValueStore>, flash_ttl: Duration) -> Self {
        Self {
            store,
            flash_ttl,
            active: Mutex::new(None),
        }
    }

    pub fn flash_ttl(&self) -> Duration {
        self.flash_ttl
    }

    /// Display `message` until `duration` elapses or it is replaced.
    pub fn show(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Duration,
    ) -> Notification {
        let notification = Notification::new(message, kind);
        *self.active.lock() = Some(Active {
            notification: notification.clone(),
            expires_at: Instant::now() + duration,
        });
        notification
    }

    pub fn success(&self, message: impl Into<String>) -> Notification {
        self.show(message, NotificationKind::Success, DEFAULT_DURATION)
    }

    pub fn error(&self, message: impl Into<String>) -> Notification {
        self.show(message, NotificationKind::Error, DEFAULT_DURATION)
    }

    /// The notification on screen, if it has not expired.
    pub fn current(&self) -> Option<Notification> {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(a) if Instant::now() < a.expires_at => Some(a.notification.clone()),
            Some(_) => {
                *active = None;
                None
            }
            None => None,
        }
    }

    pub fn dismiss(&self) {
        self.active.lock().take();
    }

    /// Store a notification for the next screen.
    pub fn persist(&self, message: impl Into<String>, kind: NotificationKind) -> bool {
        let notification = Notification::new(message, kind);
        let stored = storage::save(self.store.as_ref(), FLASH_KEY, &notification);
        if !stored {
            tracing::warn!("failed to persist notification");
        }
        stored
    }

    /// Take the persisted notification, if any and not yet expired.
    pub fn consume_persisted(&self) -> Option<Notification> {
        self.consume_persisted_at(Utc::now())
    }

    pub fn consume_persisted_at(&self, now: DateTime<Utc>) -> Option<Notification> {
        let raw = self.store.get(FLASH_KEY)?;
        self.store.remove(FLASH_KEY);

        let notification = match serde_json::from_str::<Notification>(&raw) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted notification");
                return None;
            }
        };

        let age_ms = now.timestamp_millis() - notification.timestamp;
        if age_ms > self.flash_ttl.as_millis() as i64 {
            tracing::debug!(age_ms, "persisted notification expired");
            return None;
        }
        Some(notification)
    }

    /// Called once when a screen mounts: show whatever the previous screen
    /// left behind.
    pub fn mount(&self) -> Option<Notification> {
        let notification = self.consume_persisted()?;
        *self.active.lock() = Some(Active {
            notification: notification.clone(),
            expires_at: Instant::now() + DEFAULT_DURATION,
        });
        Some(notification)
    }
}

/// Show the outcome of a mutation and pass it through.
pub fn report<T>(
    outcome: Result<T, ApiError>,
    bridge: &NotificationBridge,
    success_msg: &str,
) -> Result<T, ApiError> {
    match &outcome {
        Ok(_) => {
            bridge.success(success_msg);
        }
        Err(err) => {
            bridge.error(err.to_string());
        }
    }
    outcome
}
