use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use time::Date;

use super::labels::{day_label_for, day_labels};
use super::{sort_chronologically, EntryId, TimelineEntry};
use crate::navigation::NavigationTarget;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection index {index} is outside the timeline of {len} entries")]
    OutOfRange { index: usize, len: usize },
    #[error("entry {0} is not on the timeline")]
    NotFound(EntryId),
}

/// Broadcast to every subscriber after the grid mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    SelectionChanged { index: usize, entry_id: EntryId },
    SelectionCleared,
    EntriesReplaced { removed: Vec<EntryId> },
}

/// Owns the ordered check-ins and the single shared selection.
///
/// The grid tiles and the detail pager both drive selection through this
/// controller and both observe the same [`GridEvent`] stream, so neither
/// keeps its own copy of the selected index.
#[derive(Debug)]
pub struct TimelineGrid {
    hike_start: Date,
    entries: Vec<TimelineEntry>,
    selected: Option<usize>,
    subscribers: Vec<Sender<GridEvent>>,
}

impl TimelineGrid {
    pub fn new(hike_start: Date, mut entries: Vec<TimelineEntry>) -> Self {
        sort_chronologically(&mut entries);
        let selected = (!entries.is_empty()).then_some(0);
        Self {
            hike_start,
            entries,
            selected,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<GridEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn hike_start(&self) -> Date {
        self.hike_start
    }

    /// Day labels are relative to this date; entries and selection are untouched.
    pub fn set_hike_start(&mut self, hike_start: Date) {
        self.hike_start = hike_start;
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&TimelineEntry> {
        self.selected.and_then(|idx| self.entries.get(idx))
    }

    pub fn selected_id(&self) -> Option<&EntryId> {
        self.selected().map(TimelineEntry::id)
    }

    pub fn position_of(&self, id: &EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    pub fn select(&mut self, index: usize) -> Result<&TimelineEntry, SelectionError> {
        if index >= self.entries.len() {
            tracing::debug!(index, len = self.entries.len(), "ignoring out-of-range selection");
            return Err(SelectionError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.selected = Some(index);
        let entry_id = self.entries[index].id().clone();
        self.emit(GridEvent::SelectionChanged { index, entry_id });
        Ok(&self.entries[index])
    }

    pub fn select_id(&mut self, id: &EntryId) -> Result<&TimelineEntry, SelectionError> {
        match self.position_of(id) {
            Some(index) => self.select(index),
            None => Err(SelectionError::NotFound(id.clone())),
        }
    }

    /// Moves the selection by `delta`, clamped to the ends of the timeline.
    pub fn step(&mut self, delta: isize) -> Option<&TimelineEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        let current = self.selected.unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(last);
        self.select(next).ok()
    }

    /// Swaps in a fresh timeline, keeping the selected check-in selected when
    /// it survives the refresh.
    pub fn replace_entries(&mut self, mut entries: Vec<TimelineEntry>) {
        sort_chronologically(&mut entries);
        let previous_id = self.selected_id().cloned();
        let previous_index = self.selected;

        let removed: Vec<EntryId> = self
            .entries
            .iter()
            .map(|entry| entry.id().clone())
            .filter(|id| !entries.iter().any(|entry| entry.id() == id))
            .collect();
        self.entries = entries;

        let resolved = previous_id.as_ref().and_then(|id| self.position_of(id));
        let selection_event = match resolved {
            Some(index) => {
                self.selected = Some(index);
                (previous_index != Some(index)).then(|| GridEvent::SelectionChanged {
                    index,
                    entry_id: self.entries[index].id().clone(),
                })
            }
            None => {
                if let Some(id) = &previous_id {
                    tracing::debug!(entry = %id, "selected entry dropped by refresh");
                }
                self.selected = (!self.entries.is_empty()).then_some(0);
                match self.selected {
                    Some(index) => Some(GridEvent::SelectionChanged {
                        index,
                        entry_id: self.entries[index].id().clone(),
                    }),
                    None if previous_index.is_some() => Some(GridEvent::SelectionCleared),
                    None => None,
                }
            }
        };

        tracing::debug!(
            entries = self.entries.len(),
            removed = removed.len(),
            selected = ?self.selected,
            "timeline entries replaced"
        );
        self.emit(GridEvent::EntriesReplaced { removed });
        if let Some(event) = selection_event {
            self.emit(event);
        }
    }

    pub fn day_label(&self, index: usize) -> Option<String> {
        day_label_for(&self.entries, self.hike_start, index)
    }

    pub fn day_labels(&self) -> Vec<String> {
        day_labels(&self.entries, self.hike_start)
    }

    /// Entries in display order with `pinned` moved to the front.
    pub fn pinned_view(&self, pinned: Option<&EntryId>) -> Vec<TimelineEntry> {
        super::reorder_with_pinned(&self.entries, pinned, TimelineEntry::id)
    }

    pub fn navigation_target(&self) -> Option<NavigationTarget> {
        self.selected_id().map(|id| NavigationTarget::Entry {
            entry_id: id.clone(),
        })
    }

    fn emit(&mut self, event: GridEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::date;

    fn entry(id: &str, day: Date) -> TimelineEntry {
        TimelineEntry::new(id, day)
    }

    fn three_days() -> Vec<TimelineEntry> {
        vec![
            entry("1", date!(2024 - 05 - 01)),
            entry("2", date!(2024 - 05 - 02)),
            entry("3", date!(2024 - 05 - 03)),
        ]
    }

    fn drain(rx: &Receiver<GridEvent>) -> Vec<GridEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn select_emits_identity_of_selected_entry() {
        let mut grid = TimelineGrid::new(date!(2024 - 05 - 01), three_days());
        let rx = grid.subscribe();
        for index in [2, 0, 1] {
            let expected = grid.entries()[index].id().clone();
            grid.select(index).expect("in range");
            assert_eq!(
                drain(&rx),
                vec![GridEvent::SelectionChanged {
                    index,
                    entry_id: expected
                }]
            );
        }
    }

    #[test]
    fn out_of_range_selection_is_a_no_op() {
        let mut grid = TimelineGrid::new(date!(2024 - 05 - 01), three_days());
        grid.select(1).expect("in range");
        let rx = grid.subscribe();
        assert_matches!(
            grid.select(3),
            Err(SelectionError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(grid.selected_index(), Some(1));
        assert!(drain(&rx).is_empty());
        assert_matches!(
            grid.select_id(&EntryId::new("missing")),
            Err(SelectionError::NotFound(_))
        );
    }

    #[test]
    fn refresh_keeps_selection_identity() {
        let mut grid = TimelineGrid::new(date!(2024 - 05 - 01), three_days());
        let rx = grid.subscribe();
        grid.select(1).expect("in range");
        assert_eq!(grid.selected_id().map(EntryId::as_str), Some("2"));

        grid.replace_entries(vec![
            entry("2", date!(2024 - 05 - 02)),
            entry("3", date!(2024 - 05 - 03)),
            entry("4", date!(2024 - 05 - 04)),
        ]);
        assert_eq!(grid.selected_index(), Some(0));
        assert_eq!(grid.selected_id().map(EntryId::as_str), Some("2"));

        let events = drain(&rx);
        assert_eq!(
            events,
            vec![
                GridEvent::SelectionChanged {
                    index: 1,
                    entry_id: EntryId::new("2")
                },
                GridEvent::EntriesReplaced {
                    removed: vec![EntryId::new("1")]
                },
                GridEvent::SelectionChanged {
                    index: 0,
                    entry_id: EntryId::new("2")
                },
            ]
        );
    }

    #[test]
    fn refresh_resolves_selection_under_every_permutation() {
        let day = date!(2024 - 05 - 01);
        let orders = [
            ["a", "b", "c"],
            ["a", "c", "b"],
            ["b", "a", "c"],
            ["b", "c", "a"],
            ["c", "a", "b"],
            ["c", "b", "a"],
        ];
        for order in orders {
            let mut grid = TimelineGrid::new(
                day,
                vec![entry("a", day), entry("b", day), entry("c", day)],
            );
            grid.select(1).expect("in range");
            grid.replace_entries(order.iter().map(|id| entry(id, day)).collect());
            let expected = order.iter().position(|id| *id == "b");
            assert_eq!(grid.selected_index(), expected, "order {order:?}");
        }
    }

    #[test]
    fn refresh_without_selected_entry_falls_back() {
        let mut grid = TimelineGrid::new(date!(2024 - 05 - 01), three_days());
        grid.select(2).expect("in range");
        let rx = grid.subscribe();

        grid.replace_entries(vec![entry("9", date!(2024 - 05 - 09))]);
        assert_eq!(grid.selected_index(), Some(0));
        assert_eq!(
            drain(&rx).last(),
            Some(&GridEvent::SelectionChanged {
                index: 0,
                entry_id: EntryId::new("9")
            })
        );

        grid.replace_entries(Vec::new());
        assert_eq!(grid.selected_index(), None);
        assert_eq!(drain(&rx).last(), Some(&GridEvent::SelectionCleared));
        assert!(grid.navigation_target().is_none());
    }

    #[test]
    fn grid_and_detail_observers_see_the_same_stream() {
        let mut grid = TimelineGrid::new(date!(2024 - 05 - 01), three_days());
        let tiles = grid.subscribe();
        let detail = grid.subscribe();

        grid.select(2).expect("tap on tile");
        grid.step(-1);
        grid.select_id(&EntryId::new("3")).expect("detail jump");

        let seen_by_tiles = drain(&tiles);
        assert_eq!(seen_by_tiles.len(), 3);
        assert_eq!(seen_by_tiles, drain(&detail));
        assert_eq!(grid.selected_index(), Some(2));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut grid = TimelineGrid::new(date!(2024 - 05 - 01), three_days());
        let kept = grid.subscribe();
        drop(grid.subscribe());
        grid.select(1).expect("in range");
        assert_eq!(grid.subscribers.len(), 1);
        assert_eq!(drain(&kept).len(), 1);
    }

    #[test]
    fn construction_sorts_and_selection_never_resorts() {
        let mut grid = TimelineGrid::new(
            date!(2024 - 05 - 01),
            vec![entry("late", date!(2024 - 05 - 05)), entry("early", date!(2024 - 05 - 01))],
        );
        assert_eq!(grid.entries()[0].id().as_str(), "early");
        grid.select(1).expect("in range");
        assert_eq!(grid.entries()[1].id().as_str(), "late");
        assert_eq!(grid.day_labels(), vec!["Day 1", "Day 5"]);
        assert_eq!(
            grid.navigation_target(),
            Some(NavigationTarget::Entry {
                entry_id: EntryId::new("late")
            })
        );
        let pinned = grid.pinned_view(Some(&EntryId::new("late")));
        assert_eq!(pinned[0].id().as_str(), "late");
    }
}
