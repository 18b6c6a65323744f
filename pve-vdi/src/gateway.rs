//! Boundary to the remote hypervisor API.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::{Operation, Resource};
use crate::viewer::SpiceSession;

/// Remote calls the engine depends on.
///
/// Implemented by [`crate::proxmox::ProxmoxClient`]; tests substitute a
/// scripted in-memory gateway.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Full cluster inventory, all resource types.
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    /// Current status as reported by the owning node.
    async fn status(&self, vm: &Resource) -> Result<String>;

    /// Ask the node to perform `op`. Returns once the request is accepted,
    /// not once the guest reached its new state.
    async fn issue(&self, vm: &Resource, op: Operation) -> Result<()>;

    /// Ticket and connection parameters for a SPICE console.
    async fn spice_proxy(&self, vm: &Resource) -> Result<SpiceSession>;
}
