//! SPICE console sessions and the external `remote-viewer` process.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_REMOTE_VIEWER: &str = "remote-viewer";

/// Connection parameters returned by the `spiceproxy` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpiceSession {
    params: BTreeMap<String, Value>,
}

impl SpiceSession {
    pub fn new(params: BTreeMap<String, Value>) -> Self {
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Render as a virt-viewer connection file.
    pub fn to_virt_viewer(&self) -> String {
        let mut out = String::from("[virt-viewer]\n");
        for (key, value) in &self.params {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            out.push_str(key);
            out.push('=');
            out.push_str(&value);
            out.push('\n');
        }
        out
    }
}

/// Launcher for `remote-viewer` (virt-viewer).
#[derive(Debug, Clone)]
pub struct RemoteViewer {
    program: PathBuf,
    kiosk: bool,
    fullscreen: bool,
    inherit_stdio: bool,
}

impl RemoteViewer {
    /// Locate `program`. Bare names are looked up in `PATH`.
    pub fn new(program: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            program: resolve_program(program.as_ref())?,
            kiosk: false,
            fullscreen: false,
            inherit_stdio: true,
        })
    }

    pub fn kiosk(mut self, kiosk: bool) -> Self {
        self.kiosk = kiosk;
        self
    }

    pub fn fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    /// Whether the viewer shares our stdout/stderr. Turned off under the TUI,
    /// where its output would tear up the screen.
    pub fn inherit_stdio(mut self, inherit: bool) -> Self {
        self.inherit_stdio = inherit;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> Vec<&'static str> {
        let mut args = Vec::new();
        if self.kiosk {
            args.extend(["--kiosk", "--kiosk-quit", "on-disconnect"]);
        }
        if self.fullscreen {
            args.push("--full-screen");
        }
        // Read the connection file from stdin
        args.push("-");
        args
    }

    /// Run the viewer for `session` and wait until it exits.
    pub async fn launch(&self, session: &SpiceSession) -> Result<()> {
        let (stdout, stderr) = if self.inherit_stdio {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };

        info!(program = %self.program.display(), "Launching remote viewer");
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| Error::Viewer(format!("spawning {}: {e}", self.program.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The exit status below tells more than a pipe closed early
            match stdin.write_all(session.to_virt_viewer().as_bytes()).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
            // Dropping stdin sends EOF
        }

        let status = child.wait().await?;
        debug!(%status, "Remote viewer exited");
        if status.success() {
            Ok(())
        } else {
            Err(Error::Viewer(format!("{} exited with {status}", self.program.display())))
        }
    }
}

/// Resolve `program` the way a shell would: paths are taken as given,
/// bare names are searched in `PATH`.
pub fn resolve_program(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(Error::Viewer(format!("{} not found", program.display())))
        };
    }

    let path = std::env::var_os("PATH").unwrap_or_else(OsString::new);
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| Error::Viewer(format!("{} not found in PATH", program.display())))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
