//! pve-vdi: VDI client engine for Proxmox VE.
//!
//! The crate keeps a locally cached view of the cluster's guests in sync with
//! the remote API and drives state-changing operations until the remote side
//! reports the expected state:
//! - [`sync::Synchronizer`] polls the inventory in the background
//! - [`store::SnapshotStore`] holds the latest snapshot and the selection cursor
//! - [`operation::Coordinator`] issues start/stop/reset and waits for convergence
//! - [`proxmox::ProxmoxClient`] talks to the PVE JSON API
//! - [`viewer::RemoteViewer`] hands SPICE sessions to `remote-viewer`

pub mod command;
pub mod config;
pub mod error;
pub mod gateway;
pub mod operation;
pub mod proxmox;
pub mod resource;
pub mod selection;
pub mod store;
pub mod sync;
pub mod trigger;
pub mod viewer;

pub use error::{Error, Result};
pub use gateway::Gateway;
pub use resource::{Operation, Resource, Snapshot};
pub use store::SnapshotStore;

/// Program name, used for the config file location.
pub const PROG_NAME: &str = "pve-vdi";
