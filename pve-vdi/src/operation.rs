//! Operation coordinator: issue a state change and wait for the guest to get there.
//!
//! The API accepts operations asynchronously, so after issuing a start or stop
//! the coordinator probes the guest's status until it matches the operation's
//! target. Reset has no observable target and completes once accepted.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::resource::{Operation, Resource, STATUS_RUNNING};
use crate::viewer::SpiceSession;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_CONVERGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Issues operations against guests. Cheap to clone; every clone shares the gateway.
#[derive(Clone)]
pub struct Coordinator {
    gateway: Arc<dyn Gateway>,
    poll_interval: Duration,
    converge_timeout: Option<Duration>,
    autostart: bool,
}

impl Coordinator {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            poll_interval: DEFAULT_POLL_INTERVAL,
            converge_timeout: Some(DEFAULT_CONVERGE_TIMEOUT),
            autostart: true,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up waiting for convergence after `timeout`; `None` waits forever.
    pub fn with_converge_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.converge_timeout = timeout;
        self
    }

    /// Start stopped guests before connecting a console.
    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Issue `op` and wait until the guest reports the operation's target status.
    pub async fn operate(&self, vm: &Resource, op: Operation) -> Result<()> {
        info!(vmid = vm.vmid, node = %vm.node, %op, "Issuing operation");
        self.gateway.issue(vm, op).await?;

        match op.target() {
            Some(target) => self.converge(vm, target).await,
            None => Ok(()),
        }
    }

    async fn converge(&self, vm: &Resource, target: &'static str) -> Result<()> {
        let started = Instant::now();
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let status = self.gateway.status(vm).await?;
            debug!(vmid = vm.vmid, node = %vm.node, %status, "VM status");
            if status == target {
                return Ok(());
            }

            if let Some(timeout) = self.converge_timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(Error::ConvergenceTimeout {
                        vmid: vm.vmid,
                        target,
                        waited,
                    });
                }
            }
        }
    }

    /// Make sure the guest is running (if autostart is enabled) and fetch a
    /// SPICE session for it. A failed start is returned as is.
    pub async fn connect(&self, vm: &Resource) -> Result<SpiceSession> {
        info!(vmid = vm.vmid, node = %vm.node, "Requesting SPICE session");

        if self.autostart {
            let status = self.gateway.status(vm).await?;
            if status != STATUS_RUNNING {
                info!(vmid = vm.vmid, node = %vm.node, %status, "Autostarting VM");
                self.operate(vm, Operation::Start).await?;
            }
        }

        self.gateway.spice_proxy(vm).await
    }

    /// [`Coordinator::operate`] on its own task.
    pub fn spawn_operate(&self, vm: Resource, op: Operation) -> JoinHandle<Result<()>> {
        let this = self.clone();
        tokio::spawn(async move { this.operate(&vm, op).await })
    }

    /// [`Coordinator::connect`] on its own task.
    pub fn spawn_connect(&self, vm: Resource) -> JoinHandle<Result<SpiceSession>> {
        let this = self.clone();
        tokio::spawn(async move { this.connect(&vm).await })
    }
}
