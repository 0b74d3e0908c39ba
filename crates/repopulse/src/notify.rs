//! Transient user-facing notifications.
//!
//! Every API failure is pushed here exactly once, in addition to being
//! returned to the caller. Notifications expire on their own after
//! [`NOTIFICATION_TTL`]; readers only ever see the unexpired ones.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

/// How long a notification stays visible.
pub const NOTIFICATION_TTL: TimeDelta = TimeDelta::seconds(5);

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Error,
    Info,
}

/// A single transient notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Callback invoked for every pushed notification.
pub type NotificationListener = Box<dyn Fn(&Notification) + Send + Sync>;

/// Shared, cloneable notification sink.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    items: Vec<Notification>,
    ttl: TimeDelta,
    listener: Option<Arc<NotificationListener>>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::with_ttl(NOTIFICATION_TTL)
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: TimeDelta) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                items: Vec::new(),
                ttl,
                listener: None,
            })),
        }
    }

    /// Install a listener that sees every notification as it is pushed.
    pub fn on_notify(&self, listener: NotificationListener) {
        self.lock().listener = Some(Arc::new(listener));
    }

    /// Push an error notification.
    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }

    /// Push an informational notification.
    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let now = Utc::now();
        let (notification, listener) = {
            let mut inner = self.lock();
            inner.items.retain(|n| !n.is_expired_at(now));
            let notification = Notification {
                level,
                message: message.into(),
                created_at: now,
                expires_at: now + inner.ttl,
            };
            inner.items.push(notification.clone());
            (notification, inner.listener.clone())
        };

        // Listener runs outside the lock so it may read the center.
        if let Some(listener) = listener {
            listener(&notification);
        }
    }

    /// Unexpired notifications, oldest first.
    #[must_use]
    pub fn active(&self) -> Vec<Notification> {
        self.active_at(Utc::now())
    }

    /// Unexpired notifications as of `now`. Expired ones are dropped.
    #[must_use]
    pub fn active_at(&self, now: DateTime<Utc>) -> Vec<Notification> {
        let mut inner = self.lock();
        inner.items.retain(|n| !n.is_expired_at(now));
        inner.items.clone()
    }

    pub fn clear(&self) {
        self.lock().items.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("NotificationCenter")
            .field("items", &inner.items)
            .field("ttl", &inner.ttl)
            .finish()
    }
}
