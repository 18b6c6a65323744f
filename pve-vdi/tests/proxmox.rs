//! ProxmoxClient against a fake PVE API served by axum.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

use pve_vdi::operation::Coordinator;
use pve_vdi::proxmox::{ClientConfig, ProxmoxClient};
use pve_vdi::resource::guests;
use pve_vdi::{Error, Gateway, Operation, Resource};

const TOKEN_NAME: &str = "root@pam!vdi";
const TOKEN_VALUE: &str = "0b5e7c1a-token";

#[derive(Default)]
struct FakePve {
    statuses: Mutex<HashMap<u32, String>>,
    issued: Mutex<Vec<(String, u32, String)>>,
    broken: bool,
}

type Shared = Arc<FakePve>;

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("PVEAPIToken={}={}", TOKEN_NAME, TOKEN_VALUE);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

fn data(value: Value) -> Response {
    axum::Json(json!({ "data": value })).into_response()
}

async fn cluster_resources(State(pve): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if pve.broken {
        return "<html>proxy error</html>".into_response();
    }
    let statuses = pve.statuses.lock().unwrap();
    data(json!([
        {"id": "node/pve1", "type": "node", "node": "pve1", "status": "online", "uptime": 86400},
        {
            "id": "qemu/100", "type": "qemu", "vmid": 100, "node": "pve1", "name": "web",
            "status": statuses.get(&100).cloned().unwrap_or_default(), "uptime": 42,
            "maxmem": 4294967296u64
        },
        {"id": "storage/pve1/local", "type": "storage", "node": "pve1", "status": "available"},
        {
            "id": "qemu/101", "type": "qemu", "vmid": 101, "node": "pve2", "name": "db",
            "status": statuses.get(&101).cloned().unwrap_or_default()
        },
    ]))
}

async fn current_status(
    State(pve): State<Shared>,
    headers: HeaderMap,
    Path((_node, vmid)): Path<(String, u32)>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match pve.statuses.lock().unwrap().get(&vmid) {
        Some(status) => data(json!({ "vmid": vmid, "status": status, "qmpstatus": status })),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn change_status(
    State(pve): State<Shared>,
    headers: HeaderMap,
    Path((node, vmid, op)): Path<(String, u32, String)>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let target = match op.as_str() {
        "start" => "running",
        "stop" => "stopped",
        "reset" => "running",
        _ => return StatusCode::NOT_IMPLEMENTED.into_response(),
    };
    pve.statuses.lock().unwrap().insert(vmid, target.to_string());
    pve.issued.lock().unwrap().push((node.clone(), vmid, op.clone()));
    data(json!(format!("UPID:{node}:0000A1B2:qm{op}:{vmid}:root@pam!vdi:")))
}

async fn spice_proxy(
    State(_pve): State<Shared>,
    headers: HeaderMap,
    Path((node, vmid)): Path<(String, u32)>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    data(json!({
        "type": "spice",
        "host": format!("pvespiceproxy:65a1b2c3:{vmid}:{node}::deadbeef"),
        "proxy": "http://10.0.0.1:3128",
        "tls-port": 61000,
        "password": "secret",
        "delete-this-file": 1,
    }))
}

struct TestServer {
    pve: Shared,
    base_url: String,
}

impl TestServer {
    async fn spawn(pve: FakePve) -> Self {
        let pve = Arc::new(pve);
        let app = Router::new()
            .route("/api2/json/cluster/resources", get(cluster_resources))
            .route(
                "/api2/json/nodes/{node}/qemu/{vmid}/status/current",
                get(current_status),
            )
            .route(
                "/api2/json/nodes/{node}/qemu/{vmid}/status/{op}",
                post(change_status),
            )
            .route(
                "/api2/json/nodes/{node}/qemu/{vmid}/spiceproxy",
                post(spice_proxy),
            )
            .with_state(pve.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            pve,
            base_url: format!("http://{addr}/api2/json/"),
        }
    }

    fn client(&self, token_value: &str) -> ProxmoxClient {
        let mut config = ClientConfig::new("127.0.0.1");
        config.token_name = Some(TOKEN_NAME.to_string());
        config.token_value = Some(token_value.to_string());
        ProxmoxClient::with_base_url(&self.base_url, &config).unwrap()
    }
}

fn fake_pve() -> FakePve {
    let pve = FakePve::default();
    pve.statuses.lock().unwrap().extend([
        (100, "stopped".to_string()),
        (101, "running".to_string()),
    ]);
    pve
}

async fn find(client: &ProxmoxClient, vmid: u32) -> Resource {
    guests(client.list_resources().await.unwrap())
        .into_iter()
        .find(|vm| vm.vmid == vmid)
        .unwrap()
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_base_url() {
    let mut config = ClientConfig::new("pve.example.com");
    assert_eq!(config.base_url(), "https://pve.example.com:8006/api2/json/");
    config.port = 443;
    assert_eq!(config.base_url(), "https://pve.example.com:443/api2/json/");
}

// =============================================================================
// Inventory and status
// =============================================================================

#[tokio::test]
async fn test_list_resources() {
    let server = TestServer::spawn(fake_pve()).await;
    let client = server.client(TOKEN_VALUE);

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources.len(), 4);
    assert_eq!(resources[0].kind, "node");

    let vms = guests(resources);
    assert_eq!(vms.len(), 2);
    assert_eq!(vms[0].vmid, 100);
    assert_eq!(vms[0].name, "web");
    assert_eq!(vms[0].node, "pve1");
    assert_eq!(vms[0].status, "stopped");
    assert_eq!(vms[0].uptime_seconds, 42);
    assert_eq!(vms[1].node, "pve2");
    assert_eq!(vms[1].uptime_seconds, 0);
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let server = TestServer::spawn(fake_pve()).await;
    let client = server.client("wrong");

    match client.list_resources().await {
        Err(err @ Error::Status { .. }) => {
            assert!(!err.is_transient());
            assert!(err.to_string().ends_with("cluster/resources: 401 Unauthorized"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body() {
    let server = TestServer::spawn(FakePve {
        broken: true,
        ..FakePve::default()
    })
    .await;

    let err = server.client(TOKEN_VALUE).list_resources().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn test_current_status() {
    let server = TestServer::spawn(fake_pve()).await;
    let client = server.client(TOKEN_VALUE);

    let db = find(&client, 101).await;
    assert_eq!(client.status(&db).await.unwrap(), "running");

    server.pve.statuses.lock().unwrap().remove(&101);
    let err = client.status(&db).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unresponsive_node_times_out() {
    // Accepts connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut config = ClientConfig::new("127.0.0.1");
    config.request_timeout = Duration::from_millis(200);
    let base_url = format!("http://{addr}/api2/json/");
    let client = ProxmoxClient::with_base_url(base_url, &config).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), client.list_resources())
        .await
        .expect("request outlived its timeout");
    match result {
        Err(err @ Error::Http(_)) => {
            assert!(matches!(&err, Error::Http(e) if e.is_timeout()));
            assert!(err.is_transient());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

// =============================================================================
// Operations and consoles
// =============================================================================

#[tokio::test]
async fn test_issue_posts_to_owning_node() {
    let server = TestServer::spawn(fake_pve()).await;
    let client = server.client(TOKEN_VALUE);

    let db = find(&client, 101).await;
    client.issue(&db, Operation::Reset).await.unwrap();

    assert_eq!(
        *server.pve.issued.lock().unwrap(),
        vec![("pve2".to_string(), 101, "reset".to_string())]
    );
}

#[tokio::test]
async fn test_spice_proxy() {
    let server = TestServer::spawn(fake_pve()).await;
    let client = server.client(TOKEN_VALUE);

    let web = find(&client, 100).await;
    let session = client.spice_proxy(&web).await.unwrap();

    assert_eq!(session.get("tls-port"), Some(&json!(61000)));
    let doc = session.to_virt_viewer();
    assert!(doc.starts_with("[virt-viewer]\n"));
    assert!(doc.contains("host=pvespiceproxy:65a1b2c3:100:pve1::deadbeef\n"));
    assert!(doc.contains("proxy=http://10.0.0.1:3128\n"));
}

#[tokio::test]
async fn test_autostart_and_connect_over_http() {
    let server = TestServer::spawn(fake_pve()).await;
    let client = server.client(TOKEN_VALUE);
    let web = find(&client, 100).await;

    let gateway: Arc<dyn Gateway> = Arc::new(client);
    let session = Coordinator::new(gateway).connect(&web).await.unwrap();

    assert!(session.get("host").is_some());
    assert_eq!(
        *server.pve.issued.lock().unwrap(),
        vec![("pve1".to_string(), 100, "start".to_string())]
    );
}
