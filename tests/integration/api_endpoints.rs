//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - All REST endpoints return correct responses
//! - Metric pushes reach the registry
//! - Alert configuration can be read and updated
//! - WebSocket streaming delivers snapshots

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use server_health::{
    actors::{BroadcasterHandle, IngestorHandle, MetricIngestor, SnapshotFrame},
    api::{AlertConfigResponse, ApiConfig, ApiState, spawn_api_server},
    config::AlertPolicy,
    registry::ServerRegistry,
    store::{ConfigStore, MemoryStore},
};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use crate::helpers::*;

struct TestApi {
    addr: SocketAddr,
    registry: Arc<ServerRegistry>,
    store: Arc<MemoryStore>,
    snapshot_tx: broadcast::Sender<SnapshotFrame>,
}

impl TestApi {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn spawn_test_api() -> TestApi {
    let registry = create_registry(vec![("alpha", None), ("beta", None)]);
    let store = Arc::new(MemoryStore::new());
    let ingestor = IngestorHandle::spawn(MetricIngestor::new(registry.clone(), None));
    let (snapshot_tx, _) = broadcast::channel(16);

    let state = ApiState::new(
        registry.clone(),
        ingestor,
        store.clone(),
        AlertPolicy::default(),
        snapshot_tx.clone(),
    );
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: true,
    };

    TestApi {
        addr: spawn_api_server(config, state).await.unwrap(),
        registry,
        store,
        snapshot_tx,
    }
}

/// Wait until the server has picked up a pushed metric.
async fn wait_for_cpu(registry: &ServerRegistry, name: &str, cpu: f64) {
    for _ in 0..50 {
        if registry.lookup(name).unwrap().snapshot().await.cpu == Some(cpu) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{name} never reported cpu {cpu}");
}

#[tokio::test]
async fn test_health_endpoint() {
    let api = spawn_test_api().await;

    let response = reqwest::get(api.url("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["servers"], 2);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_list_and_get_servers() {
    let api = spawn_test_api().await;

    let servers: Value = reqwest::get(api.url("/api/v1/servers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<_> = servers
        .as_array()
        .unwrap()
        .iter()
        .map(|server| server["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(servers[0]["status"], "#cccccc");
    assert_eq!(servers[0]["scoreTrend"], json!([0.0]));

    let response = reqwest::get(api.url("/api/v1/servers/beta")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let beta: Value = response.json().await.unwrap();
    assert_eq!(beta["name"], "beta");

    let response = reqwest::get(api.url("/api/v1/servers/gamma")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: Value = response.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("gamma"));
}

#[tokio::test]
async fn test_push_metrics() {
    let api = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .post(api.url("/api/v1/metrics/alpha"))
        .body(metrics_json(33.0, 44.0))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    wait_for_cpu(&api.registry, "alpha", 33.0).await;
    let alpha = api.registry.lookup("alpha").unwrap().snapshot().await;
    assert_eq!(alpha.memory_load, Some(44.0));
}

#[tokio::test]
async fn test_push_is_accepted_even_if_dropped() {
    let api = spawn_test_api().await;
    let client = reqwest::Client::new();

    for (path, body) in [
        ("/api/v1/metrics/gamma", metrics_json(1.0, 1.0)),
        ("/api/v1/metrics/alpha", "garbage".to_string()),
    ] {
        let response = client.post(api.url(path)).body(body).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    // a valid push afterwards still lands
    client
        .post(api.url("/api/v1/metrics/alpha"))
        .body(metrics_json(5.0, 6.0))
        .send()
        .await
        .unwrap();
    wait_for_cpu(&api.registry, "alpha", 5.0).await;
    assert_eq!(api.registry.len(), 2);
}

#[tokio::test]
async fn test_alert_config_roundtrip() {
    let api = spawn_test_api().await;
    let client = reqwest::Client::new();

    let config: AlertConfigResponse = reqwest::get(api.url("/api/v1/alerts/config"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(config.cpu_threshold, None);
    assert_eq!(config.window_secs, 60);

    let response = client
        .put(api.url("/api/v1/alerts/config"))
        .json(&json!({
            "cpu_threshold": 85.5,
            "memory_threshold": 90,
            "recipient": "ops@example.com"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let config: AlertConfigResponse = response.json().await.unwrap();
    assert_eq!(config.cpu_threshold, Some(85.5));
    assert_eq!(config.memory_threshold, Some(90.0));
    assert_eq!(config.recipient.as_deref(), Some("ops@example.com"));

    assert_eq!(
        api.store.get("alert_cpu_threshold").await.unwrap().as_deref(),
        Some("85.5")
    );

    let config: AlertConfigResponse = client
        .put(api.url("/api/v1/alerts/config"))
        .json(&json!({ "memory_threshold": null }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(config.cpu_threshold, Some(85.5));
    assert_eq!(config.memory_threshold, None);
}

#[tokio::test]
async fn test_invalid_alert_config_is_rejected() {
    let api = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .put(api.url("/api/v1/alerts/config"))
        .json(&json!({ "cpu_threshold": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .put(api.url("/api/v1/alerts/config"))
        .json(&json!({ "cpu_threshold": "high" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    assert_eq!(api.store.get("alert_cpu_threshold").await.unwrap(), None);
}

#[tokio::test]
async fn test_stream_delivers_snapshots() {
    let api = spawn_test_api().await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/v1/stream", api.addr))
        .await
        .unwrap();

    // current state on connect
    let Some(Ok(Message::Text(text))) = socket.next().await else {
        panic!("expected an initial snapshot");
    };
    let frame: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(frame.as_array().unwrap().len(), 2);

    api.registry
        .lookup("beta")
        .unwrap()
        .apply_metrics(server_health::MetricPayload {
            cpu: 12.0,
            memory_load: 21.0,
        })
        .await;
    let broadcaster =
        BroadcasterHandle::spawn(api.registry.clone(), api.snapshot_tx.clone(), Duration::from_secs(3600));

    let Some(Ok(Message::Text(text))) = socket.next().await else {
        panic!("expected a broadcast snapshot");
    };
    let frame: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(frame[1]["name"], "beta");
    assert_eq!(frame[1]["cpu"], 12.0);
    assert_eq!(frame[1]["memoryLoad"], 21.0);

    broadcaster.shutdown().await;
}
