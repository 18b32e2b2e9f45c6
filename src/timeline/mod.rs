use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

pub mod grid;
pub mod labels;

pub use grid::{GridEvent, SelectionError, TimelineGrid};
pub use labels::{day_label_for, day_labels, day_number};

/// Stable identifier of a check-in. Never reused once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Name-based id for a check-in that arrived without one. The same
    /// hike, date and same-day ordinal always give the same id.
    pub fn derive(hike_id: &str, occurs_on: Date, ordinal: usize) -> Self {
        let name = format!("{hike_id}/{occurs_on}/{ordinal}");
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A dated check-in on the hike timeline.
///
/// Entries are immutable; edits go through the `with_*` builders, which
/// hand back a replacement entry carrying the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    id: EntryId,
    occurs_on: Date,
    image_ref: Option<String>,
    title: String,
    notes: String,
}

impl TimelineEntry {
    pub fn new(id: impl Into<EntryId>, occurs_on: Date) -> Self {
        Self {
            id: id.into(),
            occurs_on,
            image_ref: None,
            title: String::new(),
            notes: String::new(),
        }
    }

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn occurs_on(&self) -> Date {
        self.occurs_on
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn with_image_ref(self, image_ref: impl Into<String>) -> Self {
        let image_ref = image_ref.into();
        Self {
            image_ref: (!image_ref.trim().is_empty()).then_some(image_ref),
            ..self
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }

    pub fn with_notes(self, notes: impl Into<String>) -> Self {
        Self {
            notes: notes.into(),
            ..self
        }
    }
}

/// Moves the item whose key equals `pinned` to the front, keeping every
/// other item in its original relative order. Unknown or absent keys leave
/// the order untouched.
pub fn reorder_with_pinned<T, K, F>(items: &[T], pinned: Option<&K>, key: F) -> Vec<T>
where
    T: Clone,
    K: PartialEq + ?Sized,
    F: Fn(&T) -> &K,
{
    let Some(pinned) = pinned else {
        return items.to_vec();
    };
    let Some(position) = items.iter().position(|item| key(item) == pinned) else {
        return items.to_vec();
    };

    let mut reordered = Vec::with_capacity(items.len());
    reordered.push(items[position].clone());
    reordered.extend(
        items
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != position)
            .map(|(_, item)| item.clone()),
    );
    reordered
}

/// Stable ascending sort by calendar day.
pub fn sort_chronologically(entries: &mut [TimelineEntry]) {
    entries.sort_by_key(|entry| entry.occurs_on);
}
