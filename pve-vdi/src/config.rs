//! Command-line flags and the config file.
//!
//! The config file holds `key = value` lines where keys are flag names
//! (`host = pve.example.com`, `kiosk = true`). File values are applied first
//! and anything given on the command line overrides them.

use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::error::{Error, Result};
use crate::proxmox::{ClientConfig, DEFAULT_PORT};
use crate::sync::SyncConfig;
use crate::viewer::DEFAULT_REMOTE_VIEWER;

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// VDI client for Proxmox VE.
///
/// Without a VM argument an interactive VM list is shown. With one, the
/// operation (status, start, stop, reset, open; default open) is run on it.
#[derive(Parser, Debug, Clone)]
#[command(name = "pve-vdi", version, about, long_about = None, args_override_self = true)]
pub struct Args {
    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Proxmox hostname
    #[arg(long)]
    pub host: Option<String>,

    /// Proxmox API port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Remote viewer executable
    #[arg(long, default_value = DEFAULT_REMOTE_VIEWER)]
    pub remote_viewer: PathBuf,

    /// Kiosk mode
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, require_equals = true,
          default_value_t = false, default_missing_value = "true")]
    pub kiosk: bool,

    /// Fullscreen mode
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, require_equals = true,
          default_value_t = false, default_missing_value = "true")]
    pub fullscreen: bool,

    /// Skip TLS certificate verification
    #[arg(long = "unsafe-skip-tls-verify", action = ArgAction::Set, num_args = 0..=1,
          require_equals = true, default_value_t = false, default_missing_value = "true")]
    pub skip_tls_verify: bool,

    /// API token name (user@realm!tokenid)
    #[arg(long)]
    pub token_name: Option<String>,

    /// API token secret
    #[arg(long)]
    pub token_value: Option<String>,

    /// Start stopped VMs before opening
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, require_equals = true,
          default_value_t = true, default_missing_value = "true")]
    pub autostart_vm: bool,

    /// How often to refresh the VM list (e.g. 5s, 1m; bare numbers are seconds)
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    pub refresh_interval: Duration,

    /// How long to wait for a start/stop to take effect (0 = forever)
    #[arg(long, value_parser = parse_duration, default_value = "5m")]
    pub converge_timeout: Duration,

    /// Give up on an API request after this long
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub request_timeout: Duration,

    /// Print the SPICE session file before launching the viewer
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, require_equals = true,
          default_value_t = false, default_missing_value = "true")]
    pub debug_spice_session: bool,

    /// Write logs to this file (the interactive view never logs to the terminal)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// VM id or name
    pub vm: Option<String>,

    /// Operation: status, start, stop, reset, open
    pub operation: Option<String>,
}

impl Args {
    /// Parse `argv`, merging in the config file.
    ///
    /// An explicit `--config` must exist; the default location is optional.
    pub fn load<I, T>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        let cli = Args::try_parse_from(&argv)?;

        let entries = match &cli.config {
            Some(path) => read_config_file(path)?,
            None => match default_config_file() {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => return Ok(cli),
            },
        };
        if entries.is_empty() {
            return Ok(cli);
        }

        // Later occurrences win, so file values go before the real arguments
        let mut merged = Vec::with_capacity(argv.len() + entries.len());
        merged.extend(argv.first().cloned());
        merged.extend(file_args(&entries));
        merged.extend(argv.into_iter().skip(1));
        Ok(Args::try_parse_from(merged)?)
    }

    pub fn client_config(&self, host: &str) -> ClientConfig {
        ClientConfig {
            host: host.to_string(),
            port: self.port,
            token_name: self.token_name.clone(),
            token_value: self.token_value.clone(),
            skip_tls_verify: self.skip_tls_verify,
            request_timeout: self.request_timeout,
            ..ClientConfig::new(host)
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            interval: self.refresh_interval.max(MIN_REFRESH_INTERVAL),
            ..SyncConfig::default()
        }
    }

    pub fn converge_timeout(&self) -> Option<Duration> {
        (!self.converge_timeout.is_zero()).then_some(self.converge_timeout)
    }
}

/// Parse a duration such as `500ms`, `10s`, `1m30s` or `2h`. A bare number
/// is taken as seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {s:?}"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            unit => return Err(format!("unknown unit {unit:?} in duration {s:?}")),
        };
        total += part;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// `<config dir>/pve-vdi/pve-vdi.conf`
pub fn default_config_file() -> Option<PathBuf> {
    let name = crate::PROG_NAME;
    dirs::config_dir().map(|dir| dir.join(name).join(format!("{name}.conf")))
}

pub fn read_config_file(path: &Path) -> Result<Vec<(String, String)>> {
    let file = std::fs::File::open(path).map_err(|source| Error::ConfigFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, BufReader::new(file))
}

/// Parse `key = value` lines. Blank lines and `#` comments are skipped.
pub fn parse_config(path: &Path, reader: impl BufRead) -> Result<Vec<(String, String)>> {
    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::ConfigLine {
                path: path.to_path_buf(),
                line: idx + 1,
                text: line.to_string(),
            });
        };
        entries.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(entries)
}

/// Turn config entries into `--key=value` arguments.
fn file_args(entries: &[(String, String)]) -> Vec<OsString> {
    entries
        .iter()
        // A config file cannot point at another one
        .filter(|(key, _)| key != "config")
        .map(|(key, value)| OsString::from(format!("--{key}={value}")))
        .collect()
}
