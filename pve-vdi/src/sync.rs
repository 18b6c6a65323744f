//! Background synchronizer keeping the snapshot store fresh.
//!
//! Each cycle lists the cluster inventory, keeps the guests, optionally probes
//! each guest's current status on its node (the cluster view lags a few
//! seconds behind), and swaps the result into the store. Between cycles the
//! loop waits for the refresh interval, a refresh trigger, or shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::resource::{Snapshot, guests};
use crate::store::SnapshotStore;
use crate::trigger::{RefreshSignal, RefreshTrigger, refresh_trigger};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between periodic polls.
    pub interval: Duration,
    /// Probe each guest's status on its node after listing.
    pub probe_status: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            probe_status: true,
        }
    }
}

/// Refresh loop owning the write side of a [`SnapshotStore`].
pub struct Synchronizer {
    gateway: Arc<dyn Gateway>,
    store: SnapshotStore,
    config: SyncConfig,
    trigger: RefreshTrigger,
    signal: RefreshSignal,
}

impl Synchronizer {
    pub fn new(gateway: Arc<dyn Gateway>, store: SnapshotStore, config: SyncConfig) -> Self {
        let (trigger, signal) = refresh_trigger();
        Self {
            gateway,
            store,
            config,
            trigger,
            signal,
        }
    }

    /// A trigger for out-of-cadence refreshes.
    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    /// Run one cycle: list, filter, probe, replace.
    ///
    /// On a failed list the store is left untouched. Failed status probes
    /// only affect their own guest, which keeps the status from the listing.
    pub async fn poll_once(&self) -> Result<Snapshot> {
        debug!("Loading resources");
        let mut vms = guests(self.gateway.list_resources().await?);

        if self.config.probe_status {
            for vm in vms.iter_mut() {
                match self.gateway.status(vm).await {
                    Ok(status) => vm.status = status,
                    Err(e) => {
                        debug!(vmid = vm.vmid, node = %vm.node, error = %e, "Status probe failed");
                    }
                }
            }
        }

        debug!("{} VMs found", vms.len());
        Ok(self.store.replace(vms))
    }

    /// Spawn the refresh loop.
    ///
    /// `on_refreshed` runs after every successful swap, `on_error` after every
    /// failed cycle. Failures never stop the loop.
    pub fn start<R, E>(self, on_refreshed: R, on_error: E) -> SyncHandle
    where
        R: Fn(&Snapshot) + Send + Sync + 'static,
        E: Fn(&Error) + Send + Sync + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let trigger = self.trigger();
        let task = tokio::spawn(self.run(stop_rx, on_refreshed, on_error));
        SyncHandle {
            trigger,
            stop_tx: Some(stop_tx),
            task,
        }
    }

    async fn run<R, E>(mut self, mut stop_rx: mpsc::Receiver<()>, on_refreshed: R, on_error: E)
    where
        R: Fn(&Snapshot),
        E: Fn(&Error),
    {
        info!(interval = ?self.config.interval, "Synchronizer started");
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.recv() => break,
                result = self.poll_once() => match result {
                    Ok(snapshot) => on_refreshed(&snapshot),
                    Err(e) => {
                        warn!(error = %e, transient = e.is_transient(), "Refresh failed");
                        on_error(&e);
                    }
                },
            }

            tokio::select! {
                biased;
                _ = stop_rx.recv() => break,
                fired = self.signal.fired() => {
                    if fired {
                        debug!("Refresh triggered");
                        // Next periodic poll is one full interval after this one
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {}
            }
        }

        info!("Synchronizer stopped");
    }
}

/// Handle to a running synchronizer.
pub struct SyncHandle {
    trigger: RefreshTrigger,
    stop_tx: Option<mpsc::Sender<()>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Request a refresh without waiting for it. Coalesces with any pending request.
    pub fn trigger_refresh(&self) -> bool {
        self.trigger.trigger()
    }

    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    /// Stop the loop, abandoning an in-flight poll, and wait for it to exit.
    pub async fn shutdown(mut self) {
        drop(self.stop_tx.take());
        let _ = self.task.await;
    }
}
