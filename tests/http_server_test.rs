//! HTTP server over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use srf05_daq::bridge::StateBridge;
use srf05_daq::data::HistoryStore;
use srf05_daq::measurement_types::{Fragment, SensorStatus};
use srf05_daq::metrics::ServiceMetrics;
use srf05_daq::query::QueryService;
use srf05_daq::server::{start_server, ServerContext, ServerHandle};
use srf05_daq::state::SensorState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start(state: &SensorState) -> ServerHandle {
    let query = QueryService::new(
        Arc::new(StateBridge::new(state.clone(), 450)),
        Arc::new(HistoryStore::new(4).unwrap()),
        450,
    );
    let ctx = ServerContext::new(query).with_metrics(ServiceMetrics::new().unwrap());
    start_server(SocketAddr::from(([127, 0, 0, 1], 0)), ctx)
        .await
        .unwrap()
}

/// Send a bare HTTP/1.1 GET and return (status line, body)
async fn get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.lines().next().unwrap().to_string();
    (status, body.to_string())
}

#[tokio::test]
async fn test_latest_over_http() {
    let state = SensorState::new();
    state.publish(Fragment {
        raw_ticks: 45_000,
        status: SensorStatus::Operational,
    });
    let server = start(&state).await;

    let (status, body) = get(server.local_addr(), "/sensor/srf05").await;
    assert!(status.contains("200"), "{}", status);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["distance_raw"], 45_000);
    assert_eq!(json["distance_cm"], 100);
    assert_eq!(json["status"], "OPERATIONAL");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_history_and_unknown_paths() {
    let server = start(&SensorState::new()).await;
    let addr = server.local_addr();

    let (status, body) = get(addr, "/sensor/srf05/history").await;
    assert!(status.contains("200"));
    assert_eq!(body, r#"{"history":[]}"#);

    let (status, body) = get(addr, "/nope").await;
    assert!(status.contains("404"));
    assert_eq!(body, "Not Found");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_port_in_use_is_an_error() {
    let server = start(&SensorState::new()).await;

    let query = QueryService::new(
        Arc::new(StateBridge::new(SensorState::new(), 450)),
        Arc::new(HistoryStore::new(1).unwrap()),
        450,
    );
    let second = start_server(server.local_addr(), ServerContext::new(query)).await;
    assert!(second.is_err());

    server.shutdown().await.unwrap();
}
