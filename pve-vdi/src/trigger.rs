//! Single-slot refresh trigger.
//!
//! Requests made while one is already pending are dropped, so any number of
//! triggers between two synchronizer wake-ups cost at most one extra poll.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Sending half, handed to the front end. Never blocks.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    tx: mpsc::Sender<()>,
}

/// Receiving half, owned by the synchronizer.
#[derive(Debug)]
pub struct RefreshSignal {
    rx: mpsc::Receiver<()>,
}

pub fn refresh_trigger() -> (RefreshTrigger, RefreshSignal) {
    let (tx, rx) = mpsc::channel(1);
    (RefreshTrigger { tx }, RefreshSignal { rx })
}

impl RefreshTrigger {
    /// Request a refresh. Returns `false` if a request was already pending
    /// (or the synchronizer is gone) and this one was coalesced away.
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Refresh already pending");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

impl RefreshSignal {
    /// Wait for the next trigger. Returns `false` once all triggers are dropped.
    pub async fn fired(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
