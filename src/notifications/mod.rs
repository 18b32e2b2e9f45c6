use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::navigation::NavigationTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationKind {
    SystemMessage { message: String },
    NewCheckIn { hike_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_read: bool,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: String::new(),
            is_read: false,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InboxError {
    #[error("notification {0} is not in the inbox")]
    NotFound(String),
}

pub fn resolve(notification: &Notification) -> NavigationTarget {
    match &notification.kind {
        NotificationKind::SystemMessage { message } => NavigationTarget::Message {
            message: message.clone(),
        },
        NotificationKind::NewCheckIn { hike_id } => NavigationTarget::CheckInDetail {
            hike_id: hike_id.clone(),
        },
    }
}

/// Notifications in arrival order, addressed by id.
///
/// Read state only ever moves from unread to read. Marking never reorders.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    items: IndexMap<String, Notification>,
}

impl Inbox {
    pub fn new(notifications: impl IntoIterator<Item = Notification>) -> Self {
        let mut inbox = Self::default();
        inbox.populate(notifications);
        inbox
    }

    /// Loads a fresh batch from the notification source. Duplicate ids keep
    /// their first occurrence, and anything already read here stays read.
    pub fn populate(&mut self, notifications: impl IntoIterator<Item = Notification>) {
        let mut next: IndexMap<String, Notification> = IndexMap::new();
        for mut notification in notifications {
            if self
                .items
                .get(&notification.id)
                .is_some_and(|existing| existing.is_read)
            {
                notification.is_read = true;
            }
            match next.entry(notification.id.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!(id = %notification.id, "duplicate notification id ignored");
                }
                Entry::Vacant(slot) => {
                    slot.insert(notification);
                }
            }
        }
        self.items = next;
        tracing::debug!(count = self.items.len(), unread = self.unread_count(), "inbox populated");
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.values()
    }

    pub fn unread_count(&self) -> usize {
        self.items.values().filter(|item| !item.is_read).count()
    }

    pub fn is_read(&self, id: &str) -> Option<bool> {
        self.items.get(id).map(|item| item.is_read)
    }

    /// Marks one notification read. Returns whether anything changed.
    pub fn mark_read(&mut self, id: &str) -> Result<bool, InboxError> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| InboxError::NotFound(id.to_string()))?;
        if item.is_read {
            return Ok(false);
        }
        item.is_read = true;
        tracing::debug!(id, "notification marked read");
        Ok(true)
    }

    /// Marks every notification read and returns how many flipped.
    pub fn mark_all_read(&mut self) -> usize {
        let mut flipped = 0;
        for item in self.items.values_mut().filter(|item| !item.is_read) {
            item.is_read = true;
            flipped += 1;
        }
        tracing::debug!(flipped, "all notifications marked read");
        flipped
    }

    /// Opening a notification marks it read and yields where to go.
    pub fn open(&mut self, id: &str) -> Result<NavigationTarget, InboxError> {
        self.mark_read(id)?;
        self.items
            .get(id)
            .map(resolve)
            .ok_or_else(|| InboxError::NotFound(id.to_string()))
    }
}
