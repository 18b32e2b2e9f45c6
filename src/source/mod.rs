use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::notifications::Notification;
use crate::timeline::{EntryId, TimelineEntry};

/// Where the journal gets its check-ins and notifications from.
pub trait DataSource {
    /// Reads everything in one pass so the pieces agree with each other.
    fn load(&self) -> Result<Snapshot>;
}

/// One consistent read of a [`DataSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub hike_start: Date,
    pub entries: Vec<TimelineEntry>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HikeRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start_date: Date,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(default)]
    pub id: Option<EntryId>,
    pub occurs_on: Date,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: String,
}

impl EntryRecord {
    fn into_entry(self, id: EntryId) -> TimelineEntry {
        let entry = TimelineEntry::new(id, self.occurs_on)
            .with_title(self.title)
            .with_notes(self.notes);
        match self.image_ref {
            Some(image_ref) => entry.with_image_ref(image_ref),
            None => entry,
        }
    }
}

/// Export document produced by the journal backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalExport {
    pub hike: HikeRecord,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl JournalExport {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing journal export json")
    }

    /// Timeline entries in document order. Records without an id get one
    /// derived from the hike, their date and their position among id-less
    /// records of that date, so re-reading the same export keeps identities.
    pub fn timeline_entries(&self) -> Vec<TimelineEntry> {
        let mut ordinals: HashMap<Date, usize> = HashMap::new();
        self.entries
            .iter()
            .cloned()
            .map(|record| {
                let id = match record.id.clone() {
                    Some(id) => id,
                    None => {
                        let ordinal = ordinals.entry(record.occurs_on).or_insert(0);
                        *ordinal += 1;
                        EntryId::derive(&self.hike.id, record.occurs_on, *ordinal)
                    }
                };
                record.into_entry(id)
            })
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            hike_start: self.hike.start_date,
            entries: self.timeline_entries(),
            notifications: self.notifications.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<JournalExport> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading journal export {}", self.path.display()))?;
        JournalExport::parse(&raw)
            .with_context(|| format!("loading journal export {}", self.path.display()))
    }
}

impl DataSource for JsonFileSource {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.read()?.snapshot())
    }
}

impl DataSource for JournalExport {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot())
    }
}
