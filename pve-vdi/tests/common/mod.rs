//! Scripted in-memory gateway shared by the engine tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use pve_vdi::viewer::SpiceSession;
use pve_vdi::{Error, Gateway, Operation, Resource, Result};

/// A remote call observed by [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Status(u32),
    Issue(u32, Operation),
    SpiceProxy(u32),
}

pub fn vm(vmid: u32, name: &str, status: &str) -> Resource {
    Resource {
        id: format!("qemu/{vmid}"),
        vmid,
        kind: "qemu".to_string(),
        node: "pve1".to_string(),
        name: name.to_string(),
        status: status.to_string(),
        uptime_seconds: 0,
    }
}

pub fn node(name: &str) -> Resource {
    Resource {
        id: format!("node/{name}"),
        vmid: 0,
        kind: "node".to_string(),
        node: name.to_string(),
        name: String::new(),
        status: "online".to_string(),
        uptime_seconds: 0,
    }
}

pub fn unavailable() -> Error {
    Error::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        url: "https://pve1:8006/api2/json/cluster/resources".to_string(),
    }
}

pub fn server_error() -> Error {
    Error::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        url: "https://pve1:8006/api2/json/nodes/pve1/qemu/100/status/start".to_string(),
    }
}

#[derive(Default)]
struct Script {
    /// `None` fails the call.
    lists: VecDeque<Option<Vec<Resource>>>,
    last_list: Vec<Resource>,
    statuses: HashMap<u32, VecDeque<Option<String>>>,
    fail_issue: bool,
    hang_list: bool,
    calls: Vec<Call>,
}

/// Gateway answering from a script. Once a script runs out, listing repeats
/// the last successful answer and status probes echo the listed status.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_ok(self, resources: Vec<Resource>) -> Self {
        self.script.lock().unwrap().lists.push_back(Some(resources));
        self
    }

    pub fn list_err(self) -> Self {
        self.script.lock().unwrap().lists.push_back(None);
        self
    }

    pub fn statuses(self, vmid: u32, statuses: &[&str]) -> Self {
        self.script
            .lock()
            .unwrap()
            .statuses
            .entry(vmid)
            .or_default()
            .extend(statuses.iter().map(|s| Some(s.to_string())));
        self
    }

    pub fn status_err(self, vmid: u32) -> Self {
        self.script
            .lock()
            .unwrap()
            .statuses
            .entry(vmid)
            .or_default()
            .push_back(None);
        self
    }

    pub fn fail_issue(self) -> Self {
        self.script.lock().unwrap().fail_issue = true;
        self
    }

    /// Listing never completes.
    pub fn hang_list(self) -> Self {
        self.script.lock().unwrap().hang_list = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.script.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn list_resources(&self) -> Result<Vec<Resource>> {
        self.record(Call::List);
        let hang = self.script.lock().unwrap().hang_list;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut script = self.script.lock().unwrap();
        match script.lists.pop_front() {
            Some(Some(resources)) => {
                script.last_list = resources.clone();
                Ok(resources)
            }
            Some(None) => Err(unavailable()),
            None => Ok(script.last_list.clone()),
        }
    }

    async fn status(&self, vm: &Resource) -> Result<String> {
        self.record(Call::Status(vm.vmid));
        let mut script = self.script.lock().unwrap();
        match script.statuses.get_mut(&vm.vmid).and_then(|q| q.pop_front()) {
            Some(Some(status)) => Ok(status),
            Some(None) => Err(unavailable()),
            None => Ok(vm.status.clone()),
        }
    }

    async fn issue(&self, vm: &Resource, op: Operation) -> Result<()> {
        self.record(Call::Issue(vm.vmid, op));
        if self.script.lock().unwrap().fail_issue {
            return Err(server_error());
        }
        Ok(())
    }

    async fn spice_proxy(&self, vm: &Resource) -> Result<SpiceSession> {
        self.record(Call::SpiceProxy(vm.vmid));
        let mut params = BTreeMap::new();
        params.insert("type".to_string(), json!("spice"));
        params.insert(
            "host".to_string(),
            json!(format!("pvespiceproxy:{}:{}", vm.node, vm.vmid)),
        );
        params.insert("tls-port".to_string(), json!(61000));
        Ok(SpiceSession::new(params))
    }
}
