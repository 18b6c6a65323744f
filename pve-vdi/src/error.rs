//! Error types for pve-vdi.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the engine, the API client and the configuration layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure talking to the API.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("{url}: {status}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// The API answered with a body we could not decode.
    #[error("malformed response: {0}")]
    Decode(String),

    /// A start/stop never reached its target state.
    #[error("VM {vmid} did not become {target} within {waited:?}")]
    ConvergenceTimeout {
        vmid: u32,
        target: &'static str,
        waited: Duration,
    },

    #[error("invalid operation {0:?}")]
    UnknownOperation(String),

    #[error("could not find VM {0:?}")]
    NotFound(String),

    /// The external viewer could not be located, spawned, or exited badly.
    #[error("remote viewer: {0}")]
    Viewer(String),

    #[error("reading {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: invalid config line: {text}")]
    ConfigLine {
        path: PathBuf,
        line: usize,
        text: String,
    },

    /// Command-line (or config-file supplied) arguments were rejected.
    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is expected to clear up on its own (network
    /// hiccup, overloaded node) as opposed to a configuration problem.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Error::Decode(_) => true,
            _ => false,
        }
    }
}

/// Result type for pve-vdi operations.
pub type Result<T> = std::result::Result<T, Error>;
