use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient, user-facing message (the frontend renders these as toasts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Queue of notifications produced by mutations, drained by the UI.
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) {
        self.lock().push(Notification {
            level,
            title: title.into(),
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(NotificationLevel::Success, title, message);
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(NotificationLevel::Error, title, message);
    }

    /// Take every pending notification, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.lock())
    }

    pub fn latest(&self) -> Option<Notification> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
