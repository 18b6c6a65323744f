use std::collections::HashSet;

use chrono::Local;
use ratatui::widgets::TableState;
use tokio::sync::mpsc;

use pve_vdi::trigger::RefreshTrigger;
use pve_vdi::{Operation, Resource, Snapshot, SnapshotStore};

use crate::tui::types::{Action, ActionResult};

/// Rows moved by PageUp/PageDown.
pub const PAGE_SIZE: isize = 10;

pub struct App {
    pub host: String,
    /// Guests and cursor, shared with the synchronizer.
    pub store: SnapshotStore,
    pub table_state: TableState,

    pub should_quit: bool,
    pub status_message: Option<String>,
    /// Last refresh failure; cleared by the next successful refresh.
    pub refresh_error: Option<String>,
    pub last_refresh: Option<chrono::DateTime<chrono::Local>>,
    /// VMs with an operation or console request in flight.
    pub pending: HashSet<u32>,

    pub action_tx: mpsc::UnboundedSender<Action>,
    pub result_rx: mpsc::UnboundedReceiver<ActionResult>,
    refresh: RefreshTrigger,
}

impl App {
    pub fn new(
        host: String,
        store: SnapshotStore,
        refresh: RefreshTrigger,
        action_tx: mpsc::UnboundedSender<Action>,
        result_rx: mpsc::UnboundedReceiver<ActionResult>,
    ) -> Self {
        Self {
            host,
            store,
            table_state: TableState::default(),
            should_quit: false,
            status_message: None,
            refresh_error: None,
            last_refresh: None,
            pending: HashSet::new(),
            action_tx,
            result_rx,
            refresh,
        }
    }

    pub fn next(&mut self) {
        self.store.move_cursor(1);
    }

    pub fn previous(&mut self) {
        self.store.move_cursor(-1);
    }

    pub fn page_down(&mut self) {
        self.store.move_cursor(PAGE_SIZE);
    }

    pub fn page_up(&mut self) {
        self.store.move_cursor(-PAGE_SIZE);
    }

    pub fn first(&mut self) {
        self.store.select(0);
    }

    pub fn last(&mut self) {
        self.store.select(usize::MAX);
    }

    pub fn refresh(&mut self) {
        self.refresh.trigger();
    }

    fn send_action(&mut self, vm: &Resource, action: Action) {
        if !self.pending.insert(vm.vmid) {
            self.status_message = Some(format!("{} is busy", vm.display_name()));
            return;
        }
        let _ = self.action_tx.send(action);
    }

    /// Start a stopped VM, stop a running one.
    pub fn toggle_selected(&mut self) {
        let Some(vm) = self.store.selected() else {
            return;
        };
        let op = if vm.is_running() {
            Operation::Stop
        } else {
            Operation::Start
        };
        self.operate(vm, op);
    }

    pub fn reset_selected(&mut self) {
        if let Some(vm) = self.store.selected() {
            self.operate(vm, Operation::Reset);
        }
    }

    fn operate(&mut self, vm: Resource, op: Operation) {
        self.status_message = Some(format!("{} {}...", progress(op), vm.display_name()));
        self.send_action(&vm, Action::Operate(vm.clone(), op));
    }

    pub fn open_console(&mut self) {
        let Some(vm) = self.store.selected() else {
            return;
        };
        self.status_message = Some(format!("Connecting to {}...", vm.display_name()));
        self.send_action(&vm, Action::Console(vm.clone()));
    }

    pub fn handle_result(&mut self, result: ActionResult) {
        match result {
            ActionResult::Refreshed => {
                self.refresh_error = None;
                self.last_refresh = Some(Local::now());
            }
            ActionResult::RefreshFailed(e) => {
                self.refresh_error = Some(format!("Refresh failed: {}", e));
            }
            ActionResult::Operated {
                vmid,
                vm,
                op,
                result,
            } => {
                self.pending.remove(&vmid);
                match result {
                    Ok(()) => {
                        self.status_message = Some(format!("{} {}", done(op), vm));
                        self.refresh();
                    }
                    Err(e) => {
                        self.status_message = Some(format!("Error: {} {}: {}", op, vm, e));
                    }
                }
            }
            // The VM stays busy until its viewer exits
            ActionResult::ConsoleOpened { vm } => {
                self.status_message = Some(format!("Console open for {}", vm));
                // The VM may just have been autostarted
                self.refresh();
            }
            ActionResult::ConsoleClosed { vmid, vm, result } => {
                self.pending.remove(&vmid);
                self.status_message = Some(match result {
                    Ok(()) => format!("Console for {} closed", vm),
                    Err(e) => format!("Console error: {}: {}", vm, e),
                });
            }
        }
    }

    /// Pull the cursor from the store into the table and return the
    /// snapshot it belongs to.
    pub fn sync_table_state(&mut self) -> Snapshot {
        let (vms, cursor) = self.store.view();
        self.table_state.select(cursor);
        vms
    }
}

fn progress(op: Operation) -> &'static str {
    match op {
        Operation::Start => "Starting",
        Operation::Stop => "Stopping",
        Operation::Reset => "Resetting",
    }
}

fn done(op: Operation) -> &'static str {
    match op {
        Operation::Start => "Started",
        Operation::Stop => "Stopped",
        Operation::Reset => "Reset",
    }
}
