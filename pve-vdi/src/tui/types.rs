use pve_vdi::{Operation, Resource};

/// Work handed to the background worker.
#[derive(Debug, Clone)]
pub enum Action {
    Operate(Resource, Operation),
    /// Autostart if needed, then run the viewer.
    Console(Resource),
}

/// Everything that reaches the UI loop from other tasks.
#[derive(Debug)]
pub enum ActionResult {
    /// The synchronizer swapped in a new snapshot.
    Refreshed,
    RefreshFailed(String),
    Operated {
        vmid: u32,
        vm: String,
        op: Operation,
        result: Result<(), String>,
    },
    ConsoleOpened {
        vm: String,
    },
    ConsoleClosed {
        vmid: u32,
        vm: String,
        result: Result<(), String>,
    },
}
