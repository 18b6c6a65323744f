//! Client for the Proxmox VE JSON API.
//!
//! See <https://pve.proxmox.com/wiki/Proxmox_VE_API>. Every response is an
//! envelope `{"data": ...}`; anything but 200 is treated as a failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::resource::{Operation, Resource};
use crate::viewer::SpiceSession;

pub const DEFAULT_PORT: u16 = 8006;
pub const API_PATH: &str = "/api2/json/";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Whole-request limit, body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`ProxmoxClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// API token id, e.g. `root@pam!vdi`.
    pub token_name: Option<String>,
    pub token_value: Option<String>,
    pub skip_tls_verify: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            token_name: None,
            token_value: None,
            skip_tls_verify: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> String {
        format!("https://{}:{}{}", self.host, self.port, API_PATH)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct CurrentStatus {
    status: String,
}

pub struct ProxmoxClient {
    http: Client,
    base_url: String,
    authorization: Option<String>,
}

impl ProxmoxClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_base_url(config.base_url(), config)
    }

    /// Like [`ProxmoxClient::new`] but against an explicit API root ending in `/`.
    pub fn with_base_url(base_url: impl Into<String>, config: &ClientConfig) -> Result<Self> {
        if config.skip_tls_verify {
            warn!("Skipping TLS certificate verification!");
        }
        let http = Client::builder()
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        let authorization = config.token_name.as_ref().map(|name| {
            format!(
                "PVEAPIToken={}={}",
                name,
                config.token_value.as_deref().unwrap_or_default()
            )
        });

        Ok(Self {
            http,
            base_url: base_url.into(),
            authorization,
        })
    }

    async fn request<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "API request");

        let mut req = self.http.request(method, &url);
        if let Some(auth) = &self.authorization {
            req = req.header(AUTHORIZATION, auth);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(Error::Status { status, url });
        }

        let body = resp.bytes().await?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| Error::Decode(format!("{url}: {e}")))?;
        Ok(envelope.data)
    }

    fn guest_path(vm: &Resource) -> String {
        format!("nodes/{}/qemu/{}", vm.node, vm.vmid)
    }
}

#[async_trait]
impl Gateway for ProxmoxClient {
    async fn list_resources(&self) -> Result<Vec<Resource>> {
        self.request(Method::GET, "cluster/resources").await
    }

    async fn status(&self, vm: &Resource) -> Result<String> {
        let path = format!("{}/status/current", Self::guest_path(vm));
        let current: CurrentStatus = self.request(Method::GET, &path).await?;
        Ok(current.status)
    }

    async fn issue(&self, vm: &Resource, op: Operation) -> Result<()> {
        let path = format!("{}/status/{}", Self::guest_path(vm), op);
        // The node answers with the UPID of the task it queued
        let task: Option<String> = self.request(Method::POST, &path).await?;
        debug!(vmid = vm.vmid, node = %vm.node, task = ?task, "Operation accepted");
        Ok(())
    }

    async fn spice_proxy(&self, vm: &Resource) -> Result<SpiceSession> {
        let path = format!("{}/spiceproxy", Self::guest_path(vm));
        self.request(Method::POST, &path).await
    }
}
