//! Line markers that survive scrollback eviction.
//!
//! A marker is a caller-held handle anchored to an absolute history
//! line. The history keeps only a weak reference and adjusts the
//! anchor synchronously on every structural mutation, so the handle
//! stays correct without the caller ever touching line pointers:
//!
//! - trim(n): anchor moves up by n; disposed once it falls off the top
//! - insert(at, amount): anchors at or below `at` shift down
//! - delete(at, amount): anchors inside the range are disposed, anchors
//!   below it shift up
//!
//! Dispose is idempotent; dropping every [`Marker`] clone releases the
//! weak registration on the next notification pass.

use std::cell::RefCell;
use std::rc::Rc;

use crate::history::HistoryEvent;

/// Shared marker state, owned by the caller through [`Marker`].
#[derive(Debug)]
pub(crate) struct MarkerInner {
    id: u32,
    line: usize,
    disposed: bool,
}

impl MarkerInner {
    pub(crate) fn new(id: u32, line: usize) -> Self {
        Self {
            id,
            line,
            disposed: false,
        }
    }

    /// Re-anchor (or dispose) in response to a history mutation.
    pub(crate) fn apply(&mut self, event: HistoryEvent) {
        if self.disposed {
            return;
        }
        match event {
            HistoryEvent::Trim(amount) => {
                if self.line < amount {
                    self.disposed = true;
                } else {
                    self.line -= amount;
                }
            }
            HistoryEvent::Insert { index, amount } => {
                if self.line >= index {
                    self.line += amount;
                }
            }
            HistoryEvent::Delete { index, amount } => {
                if self.line >= index && self.line < index + amount {
                    self.disposed = true;
                } else if self.line > index {
                    self.line -= amount;
                }
            }
        }
    }
}

/// A stable reference to a history line.
///
/// Created through `Buffer::add_marker`. Cheap to clone; all clones
/// share one anchor.
#[derive(Debug, Clone)]
pub struct Marker {
    inner: Rc<RefCell<MarkerInner>>,
}

impl Marker {
    pub(crate) fn new(inner: Rc<RefCell<MarkerInner>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::rc::Weak<RefCell<MarkerInner>> {
        Rc::downgrade(&self.inner)
    }

    /// Unique id of this marker.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.inner.borrow().id
    }

    /// Current absolute line index.
    ///
    /// Meaningless once [`Marker::is_disposed`] returns true.
    #[must_use]
    pub fn line(&self) -> usize {
        self.inner.borrow().line
    }

    /// Check if the marker's anchor line was removed or the marker was
    /// explicitly disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Dispose the marker. Idempotent.
    pub fn dispose(&self) {
        self.inner.borrow_mut().disposed = true;
    }
}
