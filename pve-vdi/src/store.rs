//! Snapshot store: the cached guest list plus the selection cursor.
//!
//! Both live behind one mutex so a replacement and the cursor clamp that
//! follows it are observed together. The lock is only held for a read or a
//! swap, never across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::resource::{Resource, Snapshot};

#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) resources: Snapshot,
    /// Meaningful only while `resources` is non-empty.
    pub(crate) cursor: usize,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            resources: Arc::from(Vec::new()),
            cursor: 0,
        }
    }
}

/// Shared handle to the latest snapshot. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<Mutex<Inner>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        // Nothing inside can be left half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current snapshot. Later replacements do not affect the returned value.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.lock().resources)
    }

    pub fn len(&self) -> usize {
        self.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically swap in a new snapshot and re-validate the cursor.
    pub fn replace(&self, resources: Vec<Resource>) -> Snapshot {
        let snapshot: Snapshot = Arc::from(resources);
        let mut inner = self.lock();
        inner.resources = Arc::clone(&snapshot);
        inner.cursor = crate::selection::clamp_index(inner.cursor, snapshot.len());
        snapshot
    }
}
