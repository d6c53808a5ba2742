//! Local notification scheduling.
//!
//! Notifications are addressed by caller-chosen identifiers so that the
//! owner of a notification (the sleep timer, the reminder planner) can store
//! the handle and cancel or replace it later. Delivery is best-effort: the
//! services built on this trait log scheduler failures and carry on.

use crate::store::JsonFileStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a scheduled notification
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a notification is about; used to find and cancel groups of them
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SleepTimer,
    SleepReminder,
    FeedingReminder,
    Test,
}

/// Visible content of a notification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baby_id: Option<String>,
    /// Ongoing notification that the user cannot swipe away
    #[serde(default)]
    pub sticky: bool,
}

/// When a notification should fire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "at", rename_all = "snake_case")]
pub enum Trigger {
    Immediate,
    At(DateTime<Utc>),
}

/// A notification known to a scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: NotificationId,
    pub content: NotificationContent,
    pub trigger: Trigger,
}

/// Device notification backend
pub trait NotificationScheduler {
    /// Schedule (or replace) the notification with the given id
    fn schedule(
        &mut self,
        id: &NotificationId,
        content: &NotificationContent,
        trigger: Trigger,
    ) -> Result<()>;

    /// Cancel a notification. Unknown ids are ignored.
    fn cancel(&mut self, id: &NotificationId) -> Result<()>;

    /// All notifications currently scheduled or displayed
    fn scheduled(&self) -> Result<Vec<ScheduledNotification>>;

    fn cancel_all(&mut self) -> Result<()>;
}

impl<N: NotificationScheduler + ?Sized> NotificationScheduler for Box<N> {
    fn schedule(
        &mut self,
        id: &NotificationId,
        content: &NotificationContent,
        trigger: Trigger,
    ) -> Result<()> {
        (**self).schedule(id, content, trigger)
    }

    fn cancel(&mut self, id: &NotificationId) -> Result<()> {
        (**self).cancel(id)
    }

    fn scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        (**self).scheduled()
    }

    fn cancel_all(&mut self) -> Result<()> {
        (**self).cancel_all()
    }
}

fn upsert(list: &mut Vec<ScheduledNotification>, entry: ScheduledNotification) {
    match list.iter_mut().find(|n| n.id == entry.id) {
        Some(existing) => *existing = entry,
        None => list.push(entry),
    }
}

/// In-process scheduler
///
/// Can be told to fail, which lets tests exercise the best-effort paths of
/// the services that own notifications.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    notifications: Vec<ScheduledNotification>,
    failing: bool,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            Err(Error::Notification("scheduler unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl NotificationScheduler for MemoryScheduler {
    fn schedule(
        &mut self,
        id: &NotificationId,
        content: &NotificationContent,
        trigger: Trigger,
    ) -> Result<()> {
        self.check()?;
        upsert(
            &mut self.notifications,
            ScheduledNotification {
                id: id.clone(),
                content: content.clone(),
                trigger,
            },
        );
        Ok(())
    }

    fn cancel(&mut self, id: &NotificationId) -> Result<()> {
        self.check()?;
        self.notifications.retain(|n| &n.id != id);
        Ok(())
    }

    fn scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        self.check()?;
        Ok(self.notifications.clone())
    }

    fn cancel_all(&mut self) -> Result<()> {
        self.check()?;
        self.notifications.clear();
        Ok(())
    }
}

/// File-backed scheduler
///
/// Keeps the pending notifications in a JSON spool so a separate notifier
/// process (or the next CLI invocation) sees what is scheduled.
#[derive(Debug, Clone)]
pub struct SpoolScheduler {
    store: JsonFileStore<Vec<ScheduledNotification>>,
}

impl SpoolScheduler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonFileStore::new(path),
        }
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<ScheduledNotification>),
    {
        self.store.update_or_insert_with(Vec::new, |list| {
            f(list);
            Ok(())
        })?;
        Ok(())
    }
}

impl NotificationScheduler for SpoolScheduler {
    fn schedule(
        &mut self,
        id: &NotificationId,
        content: &NotificationContent,
        trigger: Trigger,
    ) -> Result<()> {
        let entry = ScheduledNotification {
            id: id.clone(),
            content: content.clone(),
            trigger,
        };
        self.modify(|list| upsert(list, entry))?;
        tracing::debug!("Spooled notification {}", id);
        Ok(())
    }

    fn cancel(&mut self, id: &NotificationId) -> Result<()> {
        if !self.store.path().exists() {
            return Ok(());
        }
        self.store.update(|list| {
            list.retain(|n| &n.id != id);
            Ok(())
        })?;
        tracing::debug!("Removed notification {} from spool", id);
        Ok(())
    }

    fn scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        Ok(self.store.load()?.unwrap_or_default())
    }

    fn cancel_all(&mut self) -> Result<()> {
        self.store.clear()
    }
}
