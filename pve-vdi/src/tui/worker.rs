use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, warn};

use pve_vdi::operation::Coordinator;
use pve_vdi::viewer::RemoteViewer;

use crate::tui::types::{Action, ActionResult};

fn joined<T>(result: Result<pve_vdi::Result<T>, JoinError>) -> Result<T, String> {
    match result {
        Ok(inner) => inner.map_err(|e| e.to_string()),
        Err(e) => Err(format!("task failed: {e}")),
    }
}

/// Runs every action on its own task so a slow convergence wait or an open
/// viewer never holds up the next one.
pub async fn action_worker(
    coordinator: Coordinator,
    viewer: RemoteViewer,
    debug_session: bool,
    mut action_rx: mpsc::UnboundedReceiver<Action>,
    result_tx: mpsc::UnboundedSender<ActionResult>,
) {
    while let Some(action) = action_rx.recv().await {
        let result_tx = result_tx.clone();
        match action {
            Action::Operate(vm, op) => {
                let (vmid, name) = (vm.vmid, vm.display_name());
                let handle = coordinator.spawn_operate(vm, op);
                tokio::spawn(async move {
                    let result = joined(handle.await);
                    if let Err(e) = &result {
                        warn!(vmid, %op, error = %e, "Operation failed");
                    }
                    let _ = result_tx.send(ActionResult::Operated {
                        vmid,
                        vm: name,
                        op,
                        result,
                    });
                });
            }
            Action::Console(vm) => {
                let (vmid, name) = (vm.vmid, vm.display_name());
                let handle = coordinator.spawn_connect(vm);
                let viewer = viewer.clone();
                tokio::spawn(async move {
                    let session = match joined(handle.await) {
                        Ok(session) => session,
                        Err(e) => {
                            warn!(vmid, error = %e, "Console failed");
                            let _ = result_tx.send(ActionResult::ConsoleClosed {
                                vmid,
                                vm: name,
                                result: Err(e),
                            });
                            return;
                        }
                    };
                    if debug_session {
                        debug!(vmid, session = %session.to_virt_viewer(), "SPICE session");
                    }

                    let _ = result_tx.send(ActionResult::ConsoleOpened { vm: name.clone() });
                    let result = viewer.launch(&session).await.map_err(|e| e.to_string());
                    let _ = result_tx.send(ActionResult::ConsoleClosed {
                        vmid,
                        vm: name,
                        result,
                    });
                });
            }
        }
    }
}
