//! Cursor movement over the live snapshot.
//!
//! The length used for clamping is always read from the store under its lock
//! at the moment of the move; the synchronizer may have replaced the snapshot
//! since the last keypress.

use std::sync::Arc;

use crate::resource::{Resource, Snapshot};
use crate::store::SnapshotStore;

/// Clamp `index` into `[0, len - 1]`. Returns 0 for an empty list, where the
/// cursor is undefined anyway.
pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

/// Apply `delta` to `index` without wrapping around either end.
pub fn step(index: usize, delta: isize, len: usize) -> usize {
    let moved = if delta.is_negative() {
        index.saturating_sub(delta.unsigned_abs())
    } else {
        index.saturating_add(delta.unsigned_abs())
    };
    clamp_index(moved, len)
}

impl SnapshotStore {
    /// Move the cursor by `delta` rows. Out-of-range moves stop at the first
    /// or last row. Returns the new position, `None` if there is nothing to select.
    pub fn move_cursor(&self, delta: isize) -> Option<usize> {
        let mut inner = self.lock();
        let len = inner.resources.len();
        if len == 0 {
            return None;
        }
        inner.cursor = step(inner.cursor, delta, len);
        Some(inner.cursor)
    }

    /// Jump to an absolute row, clamped to the current length.
    pub fn select(&self, index: usize) -> Option<usize> {
        let mut inner = self.lock();
        let len = inner.resources.len();
        if len == 0 {
            return None;
        }
        inner.cursor = clamp_index(index, len);
        Some(inner.cursor)
    }

    /// Current cursor position, `None` while the snapshot is empty.
    pub fn cursor(&self) -> Option<usize> {
        let inner = self.lock();
        (!inner.resources.is_empty()).then_some(inner.cursor)
    }

    /// The guest under the cursor.
    pub fn selected(&self) -> Option<Resource> {
        let inner = self.lock();
        inner.resources.get(inner.cursor).cloned()
    }

    /// Snapshot and cursor read together, for rendering.
    pub fn view(&self) -> (Snapshot, Option<usize>) {
        let inner = self.lock();
        let cursor = (!inner.resources.is_empty()).then_some(inner.cursor);
        (Arc::clone(&inner.resources), cursor)
    }
}
