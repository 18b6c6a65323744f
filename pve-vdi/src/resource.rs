//! Cluster resources as reported by the inventory call.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Resource type of QEMU guests in `cluster/resources`.
pub const GUEST_TYPE: &str = "qemu";

pub const STATUS_RUNNING: &str = "running";
pub const STATUS_STOPPED: &str = "stopped";

/// One entry of the cluster inventory.
///
/// Never mutated once published in a [`Snapshot`]; a refresh replaces the
/// whole list instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Opaque cluster-wide identifier, e.g. `qemu/100`.
    pub id: String,
    #[serde(default)]
    pub vmid: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "uptime")]
    pub uptime_seconds: u64,
}

impl Resource {
    pub fn is_guest(&self) -> bool {
        self.kind == GUEST_TYPE
    }

    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }

    /// Matches a user-supplied VM reference: numeric vmid or exact name.
    pub fn matches(&self, query: &str) -> bool {
        match query.parse::<u32>() {
            Ok(vmid) if vmid == self.vmid => true,
            _ => self.name == query,
        }
    }

    /// Name for messages; falls back to the vmid for unnamed guests.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.vmid.to_string()
        } else {
            self.name.clone()
        }
    }
}

/// An immutable, fully-formed list of guests from one poll cycle.
pub type Snapshot = Arc<[Resource]>;

/// Keep only VM-like entries, preserving order.
pub fn guests(resources: Vec<Resource>) -> Vec<Resource> {
    resources.into_iter().filter(|r| r.is_guest()).collect()
}

/// State-changing operations on a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Start,
    Stop,
    Reset,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Reset => "reset",
        }
    }

    /// Status the guest settles in once the operation completed.
    /// `None` for operations that have nothing observable to wait for.
    pub fn target(&self) -> Option<&'static str> {
        match self {
            Operation::Start => Some(STATUS_RUNNING),
            Operation::Stop => Some(STATUS_STOPPED),
            Operation::Reset => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Operation::Start),
            "stop" => Ok(Operation::Stop),
            "reset" => Ok(Operation::Reset),
            other => Err(Error::UnknownOperation(other.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) fn guest(vmid: u32, name: &str, status: &str) -> Resource {
    Resource {
        id: format!("qemu/{vmid}"),
        vmid,
        kind: GUEST_TYPE.to_string(),
        node: "pve1".to_string(),
        name: name.to_string(),
        status: status.to_string(),
        uptime_seconds: 0,
    }
}
