//! Bounded circular history of buffer lines.
//!
//! ## Design
//!
//! A `VecDeque` ring bounded by `max_length`. Pushing at capacity
//! evicts the oldest line and fires a trim notification *before* the
//! new line becomes visible, so every absolute index held by a
//! dependent is re-anchored exactly once.
//!
//! The history owns the marker observer list (weak references) and
//! notifies it synchronously inside each mutating call; there is no
//! deferred event delivery. Reflow commits use
//! [`History::splice_no_trim`] with events suppressed and replay its
//! accumulated per-paragraph deltas afterwards via
//! [`History::fire_event`].
//!
//! Index arguments outside `[0, len)` are programming errors (the
//! buffer is the sole caller) and panic rather than returning errors.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::line::Line;
use crate::marker::{Marker, MarkerInner};

/// A structural mutation of the history, as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    /// The `n` oldest lines were removed; all absolute indices shift
    /// up by `n`.
    Trim(usize),
    /// `amount` lines were inserted at `index`.
    Insert {
        /// Absolute index of the first inserted line.
        index: usize,
        /// Number of inserted lines.
        amount: usize,
    },
    /// `amount` lines were deleted starting at `index`.
    Delete {
        /// Absolute index of the first deleted line.
        index: usize,
        /// Number of deleted lines.
        amount: usize,
    },
}

/// Fixed-capacity ordered line storage with change notifications.
#[derive(Debug)]
pub struct History {
    lines: VecDeque<Line>,
    max_length: usize,
    markers: Vec<Weak<RefCell<MarkerInner>>>,
    next_marker_id: u32,
}

impl History {
    /// Create an empty history bounded by `max_length` lines.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_length.min(4096)),
            max_length: max_length.max(1),
            markers: Vec::new(),
            next_marker_id: 0,
        }
    }

    /// Current number of lines.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the history holds no lines.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines.
    #[must_use]
    #[inline]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Check if the ring is at capacity.
    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.lines.len() >= self.max_length
    }

    /// Change the capacity bound.
    ///
    /// The caller trims excess content first when shrinking; the bound
    /// itself never drops below the current length here.
    pub fn set_max_length(&mut self, max_length: usize) {
        debug_assert!(
            max_length >= self.lines.len(),
            "capacity reduced below current length: {} < {}",
            max_length,
            self.lines.len()
        );
        self.max_length = max_length.max(1);
    }

    /// Get a line by absolute index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Get a mutable line by absolute index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Line> {
        self.lines.get_mut(index)
    }

    /// Replace the line at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn set(&mut self, index: usize, line: Line) {
        self.lines[index] = line;
    }

    /// Append a line, evicting the oldest (and firing a trim event)
    /// when at capacity.
    pub fn push(&mut self, line: Line) {
        if self.is_full() {
            self.lines.pop_front();
            self.notify(HistoryEvent::Trim(1));
        }
        self.lines.push_back(line);
    }

    /// Remove and return the newest line.
    pub fn pop(&mut self) -> Option<Line> {
        self.lines.pop_back()
    }

    /// Replace `delete_count` lines starting at `start` with `lines`.
    ///
    /// When `fire_events` is set, delete and insert notifications
    /// describing the net effect are fired (delete first, matching the
    /// mutation order). Reflow suppresses them and replays its own
    /// per-paragraph events instead.
    ///
    /// The capacity bound is *not* enforced here; the caller trims
    /// afterwards if the splice grew the history past `max_length`.
    ///
    /// # Panics
    ///
    /// Panics if `start + delete_count` exceeds the current length.
    pub fn splice_no_trim(
        &mut self,
        start: usize,
        delete_count: usize,
        lines: Vec<Line>,
        fire_events: bool,
    ) {
        assert!(
            start + delete_count <= self.lines.len(),
            "splice range {}..{} out of bounds (len {})",
            start,
            start + delete_count,
            self.lines.len()
        );
        let inserted = lines.len();
        let tail: Vec<Line> = self.lines.drain(start..).collect();
        self.lines.extend(lines);
        self.lines.extend(tail.into_iter().skip(delete_count));

        if fire_events {
            if delete_count > 0 {
                self.notify(HistoryEvent::Delete {
                    index: start,
                    amount: delete_count,
                });
            }
            if inserted > 0 {
                self.notify(HistoryEvent::Insert {
                    index: start,
                    amount: inserted,
                });
            }
        }
    }

    /// Remove the `count` oldest lines, firing a single trim event.
    pub fn trim_start(&mut self, count: usize) {
        let count = count.min(self.lines.len());
        if count == 0 {
            return;
        }
        trace!(count, "trimming history start");
        self.lines.drain(..count);
        self.notify(HistoryEvent::Trim(count));
    }

    /// Register a marker anchored at `line`.
    pub fn add_marker(&mut self, line: usize) -> Marker {
        let inner = Rc::new(RefCell::new(MarkerInner::new(self.next_marker_id, line)));
        self.next_marker_id += 1;
        let marker = Marker::new(inner);
        self.markers.push(marker.downgrade());
        marker
    }

    /// Number of live (still referenced) markers.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.markers.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Deliver an event to all live markers, pruning dead ones.
    pub(crate) fn fire_event(&mut self, event: HistoryEvent) {
        self.notify(event);
    }

    fn notify(&mut self, event: HistoryEvent) {
        self.markers.retain(|weak| match weak.upgrade() {
            Some(inner) => {
                inner.borrow_mut().apply(event);
                true
            }
            None => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with(max: usize, count: usize) -> History {
        let mut history = History::new(max);
        for _ in 0..count {
            history.push(Line::new(10));
        }
        history
    }

    #[test]
    fn push_within_capacity_grows() {
        let history = history_with(5, 3);
        assert_eq!(history.len(), 3);
        assert!(!history.is_full());
    }

    #[test]
    fn push_at_capacity_evicts_and_trims_markers() {
        let mut history = history_with(3, 3);
        let marker = history.add_marker(0);
        history.push(Line::new(10));
        assert_eq!(history.len(), 3);
        assert!(marker.is_disposed());
    }

    #[test]
    fn push_eviction_shifts_later_markers() {
        let mut history = history_with(3, 3);
        let marker = history.add_marker(2);
        history.push(Line::new(10));
        assert_eq!(marker.line(), 1);
        assert!(!marker.is_disposed());
    }

    #[test]
    fn splice_replaces_range() {
        let mut history = history_with(10, 5);
        history.get_mut(1).unwrap().set_cell(0, crate::cell::Cell::new('a', 1));
        history.splice_no_trim(2, 2, vec![Line::new(10), Line::new(10), Line::new(10)], false);
        assert_eq!(history.len(), 6);
        // Line before the splice range is untouched.
        assert_eq!(history.get(1).unwrap().trimmed_length(), 1);
    }

    #[test]
    fn splice_fires_delete_then_insert() {
        let mut history = history_with(10, 5);
        let marker = history.add_marker(4);
        history.splice_no_trim(1, 1, vec![Line::new(10), Line::new(10)], true);
        // delete at 1 shifts 4 -> 3, insert of 2 at 1 shifts 3 -> 5
        assert_eq!(marker.line(), 5);
    }

    #[test]
    fn trim_start_fires_single_event() {
        let mut history = history_with(10, 6);
        let survivor = history.add_marker(4);
        let victim = history.add_marker(1);
        history.trim_start(3);
        assert_eq!(history.len(), 3);
        assert_eq!(survivor.line(), 1);
        assert!(victim.is_disposed());
    }

    #[test]
    fn dropped_marker_handles_are_pruned() {
        let mut history = history_with(10, 5);
        {
            let _marker = history.add_marker(1);
        }
        history.trim_start(1);
        assert_eq!(history.marker_count(), 0);
    }

    #[test]
    #[should_panic(expected = "splice range")]
    fn splice_out_of_range_panics() {
        let mut history = history_with(10, 3);
        history.splice_no_trim(2, 5, Vec::new(), false);
    }
}
