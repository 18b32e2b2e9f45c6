use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use time::Date;

use crate::config::AppConfig;
use crate::imaging::{ImageEvent, ImageLoader};
use crate::navigation::NavigationTarget;
use crate::notifications::{resolve, Inbox, InboxError};
use crate::source::{DataSource, Snapshot};
use crate::timeline::{EntryId, GridEvent, SelectionError, TimelineEntry, TimelineGrid};

pub mod phase;

pub use phase::{PhaseError, PhaseEvent, SessionPhase};

/// Owner of one hike's timeline, image cache and inbox.
///
/// Everything here mutates on the caller's thread. Image fetches run
/// elsewhere but their results only land during [`Journal::on_tick`].
#[derive(Debug)]
pub struct Journal {
    pub config: Arc<AppConfig>,
    phase: SessionPhase,
    grid: TimelineGrid,
    grid_events: Receiver<GridEvent>,
    images: ImageLoader,
    inbox: Inbox,
}

impl Journal {
    pub fn new(config: Arc<AppConfig>, images: ImageLoader) -> Self {
        let mut grid = TimelineGrid::new(Date::MIN, Vec::new());
        let grid_events = grid.subscribe();
        Self {
            config,
            phase: SessionPhase::default(),
            grid,
            grid_events,
            images,
            inbox: Inbox::default(),
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn grid(&self) -> &TimelineGrid {
        &self.grid
    }

    /// Extra observers (a detail pager, say) share the grid's event stream.
    pub fn subscribe(&mut self) -> Receiver<GridEvent> {
        self.grid.subscribe()
    }

    pub fn images(&self) -> &ImageLoader {
        &self.images
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn inbox_mut(&mut self) -> &mut Inbox {
        &mut self.inbox
    }

    pub fn sign_in_required(&mut self) -> Result<()> {
        self.transition(PhaseEvent::SignInRequired)
    }

    /// Pulls the timeline and inbox from `source`. Sign-in happens outside
    /// this crate, so a session still starting up counts as signed in here.
    /// Image prefetching for the new selection happens on the next tick.
    pub fn refresh(&mut self, source: &dyn DataSource) -> Result<()> {
        let event = match self.phase {
            SessionPhase::Starting | SessionPhase::Authenticating => PhaseEvent::SignedIn,
            _ => PhaseEvent::Refresh,
        };
        self.transition(event)?;

        match source.load().context("loading journal data") {
            Ok(Snapshot {
                hike_start,
                entries,
                notifications,
            }) => {
                self.grid.set_hike_start(hike_start);
                self.grid.replace_entries(entries);
                self.inbox.populate(notifications);
                self.transition(PhaseEvent::Loaded)?;
                tracing::info!(
                    entries = self.grid.len(),
                    unread = self.inbox.unread_count(),
                    "journal refreshed"
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(?err, "journal refresh failed");
                self.transition(PhaseEvent::Failed(format!("{err:#}")))?;
                Err(err)
            }
        }
    }

    pub fn select(&mut self, index: usize) -> Result<&TimelineEntry, SelectionError> {
        self.grid.select(index)
    }

    pub fn select_id(&mut self, id: &EntryId) -> Result<&TimelineEntry, SelectionError> {
        self.grid.select_id(id)
    }

    pub fn step(&mut self, delta: isize) -> Option<&TimelineEntry> {
        self.grid.step(delta)
    }

    pub fn retry_image(&mut self, index: usize) -> bool {
        match self.grid.entries().get(index) {
            Some(entry) => self.images.retry(entry),
            None => false,
        }
    }

    /// Applies pending grid events and finished image fetches.
    ///
    /// Queued events may predate later refreshes, so prefetching works from
    /// the grid's current selection rather than from indices in the events.
    pub fn on_tick(&mut self) -> Vec<ImageEvent> {
        let pending: Vec<GridEvent> = self.grid_events.try_iter().collect();
        let mut prefetch = false;
        for event in pending {
            match event {
                GridEvent::EntriesReplaced { removed } => {
                    for id in &removed {
                        self.images.forget(id);
                    }
                    self.images.retain_entries(self.grid.entries());
                    prefetch = true;
                }
                GridEvent::SelectionChanged { entry_id, .. } => {
                    prefetch |= self.grid.position_of(&entry_id).is_some();
                }
                GridEvent::SelectionCleared => {}
            }
        }
        if prefetch {
            if let Some(index) = self.grid.selected_index() {
                self.prefetch_around(index);
            }
        }
        self.images.poll()
    }

    /// Ticks until no fetch is in flight or `timeout` runs out.
    pub fn settle_images(&mut self, timeout: Duration) -> Vec<ImageEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.on_tick();
        while self.images.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(in_flight = self.images.in_flight(), "gave up waiting for images");
                break;
            }
            events.extend(self.images.wait_next(remaining));
            events.extend(self.on_tick());
        }
        events
    }

    /// Resolves a notification, marking it read when configured to.
    pub fn open_notification(&mut self, id: &str) -> Result<NavigationTarget, InboxError> {
        if self.config.inbox.mark_read_on_open {
            return self.inbox.open(id);
        }
        self.inbox
            .get(id)
            .map(resolve)
            .ok_or_else(|| InboxError::NotFound(id.to_string()))
    }

    fn prefetch_around(&mut self, index: usize) {
        let entries = self.grid.entries();
        if entries.is_empty() {
            return;
        }
        let reach = self.config.timeline.prefetch_neighbours;
        let last_index = entries.len() - 1;
        let index = index.min(last_index);
        let first = index.saturating_sub(reach);
        let last = index.saturating_add(reach).min(last_index);
        for entry in &entries[first..=last] {
            self.images.request(entry);
        }
    }

    fn transition(&mut self, event: PhaseEvent) -> Result<()> {
        let next = self
            .phase
            .next(event)
            .context("advancing journal session phase")?;
        tracing::debug!(from = ?self.phase, to = ?next, "session phase changed");
        self.phase = next;
        Ok(())
    }
}
