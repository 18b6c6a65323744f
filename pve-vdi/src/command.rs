//! One-shot commands: `pve-vdi <vm> [status|start|stop|reset|open]`.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use tracing::info;

use crate::error::{Error, Result};
use crate::operation::Coordinator;
use crate::resource::{Operation, Resource, guests};
use crate::viewer::RemoteViewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Print the guest's current status.
    Status,
    /// Autostart if needed and open a SPICE console.
    #[default]
    Open,
    Operate(Operation),
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "status" => Ok(Command::Status),
            "open" => Ok(Command::Open),
            other => other.parse().map(Command::Operate),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Status => f.write_str("status"),
            Command::Open => f.write_str("open"),
            Command::Operate(op) => op.fmt(f),
        }
    }
}

/// Find a guest by vmid or name. The first match in list order wins.
pub fn find_guest<'a>(vms: &'a [Resource], query: &str) -> Result<&'a Resource> {
    vms.iter()
        .find(|vm| vm.matches(query))
        .ok_or_else(|| Error::NotFound(query.to_string()))
}

/// Run one command against the guest matching `query` and return.
///
/// `operation` is validated before any request is made. Command output
/// (the status, the session file with `debug_session`) goes to `out`.
pub async fn run(
    coordinator: &Coordinator,
    viewer: &RemoteViewer,
    query: &str,
    operation: Option<&str>,
    debug_session: bool,
    out: &mut impl Write,
) -> Result<()> {
    let command = operation
        .map(str::parse::<Command>)
        .transpose()?
        .unwrap_or_default();

    let vms = guests(coordinator.gateway().list_resources().await?);
    for vm in &vms {
        info!(vmid = vm.vmid, name = %vm.name, node = %vm.node, status = %vm.status, "Found VM");
    }
    let vm = find_guest(&vms, query)?;

    match command {
        Command::Status => {
            let status = coordinator.gateway().status(vm).await?;
            writeln!(out, "{status}")?;
        }
        Command::Operate(op) => {
            coordinator.operate(vm, op).await?;
            info!(vmid = vm.vmid, node = %vm.node, %op, "Operation complete");
        }
        Command::Open => {
            let session = coordinator.connect(vm).await?;
            if debug_session {
                write!(out, "{}", session.to_virt_viewer())?;
                out.flush()?;
            }
            viewer.launch(&session).await?;
        }
    }

    Ok(())
}
