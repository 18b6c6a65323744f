use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pve_vdi::command;
use pve_vdi::config::Args;
use pve_vdi::operation::Coordinator;
use pve_vdi::proxmox::ProxmoxClient;
use pve_vdi::viewer::RemoteViewer;
use pve_vdi::{Error, Gateway};

mod tui;

const DEFAULT_LOG_FILTER: &str = "pve_vdi=info,reqwest=warn,hyper=warn";

/// Logs go to stderr for one-shot commands. The TUI owns the terminal, so
/// there they go to `log_file` or nowhere.
fn init_logging(interactive: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
                .init();
        }
        None if interactive => registry.init(),
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::load(std::env::args_os()) {
        Ok(args) => args,
        Err(Error::Args(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    let interactive = args.vm.is_none();
    init_logging(interactive, args.log_file.as_deref())?;

    let Some(host) = args.host.clone() else {
        bail!("no Proxmox host given (use --host or set `host` in the config file)");
    };

    let viewer = RemoteViewer::new(&args.remote_viewer)?
        .kiosk(args.kiosk)
        .fullscreen(args.fullscreen)
        .inherit_stdio(!interactive);
    debug!(program = %viewer.program().display(), "Remote viewer found");

    let client = ProxmoxClient::new(&args.client_config(&host))?;
    let gateway: Arc<dyn Gateway> = Arc::new(client);
    let coordinator = Coordinator::new(gateway)
        .with_converge_timeout(args.converge_timeout())
        .with_autostart(args.autostart_vm);

    info!(%host, port = args.port, "Connecting to Proxmox VE");

    match args.vm.as_deref() {
        Some(vm) => {
            command::run(
                &coordinator,
                &viewer,
                vm,
                args.operation.as_deref(),
                args.debug_spice_session,
                &mut std::io::stdout(),
            )
            .await?
        }
        None => {
            tui::run(
                coordinator,
                viewer,
                args.sync_config(),
                &host,
                args.debug_spice_session,
            )
            .await?
        }
    }

    Ok(())
}
