use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indexmap::IndexMap;
use strum::{AsRefStr, Display};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::timeline::{EntryId, TimelineEntry};

mod fetch;

pub use fetch::FileFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum FetchErrorKind {
    #[error("network error while fetching image")]
    Network,
    #[error("image not found")]
    NotFound,
    #[error("image could not be decoded")]
    Decode,
}

impl FetchErrorKind {
    /// Missing images stay missing; everything else is worth another try.
    pub fn retry_offered(self) -> bool {
        !matches!(self, FetchErrorKind::NotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }
}

/// Fetched image bytes, cheap to clone into every tile that shows them.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageHandle {
    format: ImageFormat,
    bytes: Arc<[u8]>,
}

impl ImageHandle {
    pub fn decode(bytes: impl Into<Arc<[u8]>>) -> Result<Self, FetchErrorKind> {
        let bytes = bytes.into();
        let format = ImageFormat::sniff(&bytes).ok_or(FetchErrorKind::Decode)?;
        Ok(Self { format, bytes })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageLoadState {
    #[default]
    Idle,
    Loading,
    Loaded(ImageHandle),
    Failed(FetchErrorKind),
}

impl ImageLoadState {
    pub fn label(&self) -> String {
        match self {
            ImageLoadState::Idle => "idle".to_string(),
            ImageLoadState::Loading => "loading".to_string(),
            ImageLoadState::Loaded(handle) => format!("loaded {} ({} bytes)", handle.format(), handle.len()),
            ImageLoadState::Failed(kind) => format!("failed ({})", kind.as_ref()),
        }
    }
}

/// Applied outcome of a finished fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEvent {
    Loaded { entry_id: EntryId },
    Failed { entry_id: EntryId, kind: FetchErrorKind },
}

#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    async fn fetch(&self, image_ref: &str) -> Result<ImageHandle, FetchErrorKind>;
}

#[derive(Debug)]
struct Slot {
    image_ref: String,
    state: ImageLoadState,
    attempt: u64,
    task: Option<JoinHandle<()>>,
}

impl Slot {
    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug)]
struct Completion {
    entry_id: EntryId,
    attempt: u64,
    result: Result<ImageHandle, FetchErrorKind>,
}

static IDLE: ImageLoadState = ImageLoadState::Idle;

/// Per-entry image load state machines sharing one fetch collaborator.
///
/// Fetches run as independent tasks on the supplied runtime. Their results
/// come back over a channel and are only applied when the owner calls
/// [`ImageLoader::poll`] or [`ImageLoader::wait_next`], so every state change
/// happens on the owner's thread.
pub struct ImageLoader {
    fetcher: Arc<dyn ImageFetcher>,
    runtime: Handle,
    slots: IndexMap<EntryId, Slot>,
    next_attempt: u64,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
}

impl ImageLoader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, runtime: Handle) -> Self {
        let (completions_tx, completions_rx) = crossbeam_channel::unbounded();
        Self {
            fetcher,
            runtime,
            slots: IndexMap::new(),
            next_attempt: 0,
            completions_tx,
            completions_rx,
        }
    }

    pub fn state(&self, id: &EntryId) -> &ImageLoadState {
        self.slots.get(id).map(|slot| &slot.state).unwrap_or(&IDLE)
    }

    pub fn in_flight(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.state == ImageLoadState::Loading)
            .count()
    }

    /// Starts loading an idle entry's image. Returns whether a fetch began.
    ///
    /// An entry whose image ref changed since its slot was filled starts over
    /// from `Idle`, so an edited check-in never keeps showing the old photo.
    pub fn request(&mut self, entry: &TimelineEntry) -> bool {
        self.drop_if_outdated(entry);
        let Some(image_ref) = entry.image_ref() else {
            return false;
        };
        match self.state(entry.id()) {
            ImageLoadState::Idle => {
                self.start_fetch(entry.id().clone(), image_ref.to_string());
                true
            }
            ImageLoadState::Loading | ImageLoadState::Loaded(_) | ImageLoadState::Failed(_) => {
                false
            }
        }
    }

    /// Re-enters `Loading` from `Failed`. Returns whether a fetch began.
    pub fn retry(&mut self, entry: &TimelineEntry) -> bool {
        if self.drop_if_outdated(entry) {
            return self.request(entry);
        }
        let Some(image_ref) = entry.image_ref() else {
            return false;
        };
        if !matches!(self.state(entry.id()), ImageLoadState::Failed(_)) {
            return false;
        }
        tracing::debug!(entry = %entry.id(), "retrying image fetch");
        self.start_fetch(entry.id().clone(), image_ref.to_string());
        true
    }

    /// Abandons an in-flight fetch, returning the entry to `Idle`.
    pub fn cancel(&mut self, id: &EntryId) -> bool {
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        if slot.state != ImageLoadState::Loading {
            return false;
        }
        slot.abort();
        slot.state = ImageLoadState::Idle;
        tracing::debug!(entry = %id, attempt = slot.attempt, "image fetch cancelled");
        true
    }

    /// Drops all state for an entry that left the timeline.
    pub fn forget(&mut self, id: &EntryId) {
        if let Some(mut slot) = self.slots.shift_remove(id) {
            slot.abort();
            tracing::debug!(entry = %id, "image state forgotten");
        }
    }

    /// Keeps state only for entries still on the timeline whose image ref
    /// is unchanged.
    pub fn retain_entries(&mut self, entries: &[TimelineEntry]) {
        let stale: Vec<EntryId> = self
            .slots
            .iter()
            .filter(|(id, slot)| {
                !entries
                    .iter()
                    .any(|entry| entry.id() == *id && entry.image_ref() == Some(slot.image_ref.as_str()))
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            self.forget(&id);
        }
    }

    fn drop_if_outdated(&mut self, entry: &TimelineEntry) -> bool {
        let outdated = self
            .slots
            .get(entry.id())
            .is_some_and(|slot| entry.image_ref() != Some(slot.image_ref.as_str()));
        if outdated {
            tracing::debug!(entry = %entry.id(), "image ref changed, dropping cached state");
            self.forget(entry.id());
        }
        outdated
    }

    /// Applies every completion that has arrived so far.
    pub fn poll(&mut self) -> Vec<ImageEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(event) = self.apply(completion) {
                events.push(event);
            }
        }
        events
    }

    /// Blocks until one completion is applied or `timeout` elapses.
    pub fn wait_next(&mut self, timeout: Duration) -> Option<ImageEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.completions_rx.recv_timeout(remaining) {
                Ok(completion) => {
                    if let Some(event) = self.apply(completion) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn start_fetch(&mut self, entry_id: EntryId, image_ref: String) {
        let attempt = self.next_attempt;
        self.next_attempt += 1;

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.completions_tx.clone();
        let task_id = entry_id.clone();
        let task_ref = image_ref.clone();
        let task = self.runtime.spawn(async move {
            let image_ref = task_ref;
            let result = fetcher.fetch(&image_ref).await;
            // The loader may already be gone; nothing left to report to.
            let _ = tx.send(Completion {
                entry_id: task_id,
                attempt,
                result,
            });
        });

        tracing::debug!(entry = %entry_id, attempt, "image fetch started");
        let slot = self.slots.entry(entry_id).or_insert_with(|| Slot {
            image_ref: image_ref.clone(),
            state: ImageLoadState::Idle,
            attempt,
            task: None,
        });
        slot.abort();
        slot.image_ref = image_ref;
        slot.state = ImageLoadState::Loading;
        slot.attempt = attempt;
        slot.task = Some(task);
    }

    fn apply(&mut self, completion: Completion) -> Option<ImageEvent> {
        let Completion {
            entry_id,
            attempt,
            result,
        } = completion;
        let Some(slot) = self.slots.get_mut(&entry_id) else {
            tracing::debug!(entry = %entry_id, attempt, "discarding fetch for removed entry");
            return None;
        };
        if slot.attempt != attempt || slot.state != ImageLoadState::Loading {
            tracing::debug!(entry = %entry_id, attempt, "discarding stale fetch result");
            return None;
        }
        slot.task = None;
        match result {
            Ok(handle) => {
                tracing::debug!(entry = %entry_id, bytes = handle.len(), "image loaded");
                slot.state = ImageLoadState::Loaded(handle);
                Some(ImageEvent::Loaded { entry_id })
            }
            Err(kind) => {
                tracing::warn!(entry = %entry_id, error = %kind, "image fetch failed");
                slot.state = ImageLoadState::Failed(kind);
                Some(ImageEvent::Failed { entry_id, kind })
            }
        }
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        for slot in self.slots.values_mut() {
            slot.abort();
        }
    }
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("slots", &self.slots.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
