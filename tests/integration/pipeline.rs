//! End-to-end tests of ingest → score → alert → broadcast

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use server_health::{
    actors::{
        BroadcasterHandle, IngestOutcome, IngestorHandle, MetricEvent, MetricIngestor,
        ProberHandle,
    },
    alerts::{AlertMetric, AlertOutcome},
    config::{AlertPolicy, ProbePolicy, read_config_file},
    registry::{ProbeStatus, ServerRegistry},
    scoring::StatusColor,
    store::{LAST_SENT_KEY, MEMORY_THRESHOLD_KEY, MemoryStore, RECIPIENT_KEY},
};
use tokio::sync::broadcast;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn probe_policy() -> ProbePolicy {
    ProbePolicy {
        interval_secs: 3600,
        timeout_ms: 1000,
    }
}

async fn ingest(handle: &IngestorHandle, channel: &str, cpu: f64, memory: f64) -> IngestOutcome {
    handle
        .ingest_now(MetricEvent::new(channel, metrics_json(cpu, memory)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_metric_probe_and_alert_pipeline() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let registry = create_registry(vec![
        ("alpha", Some(address_of(&mock_server))),
        ("beta", None),
    ]);
    let (alerts, notifier) =
        create_alert_manager(create_alert_store(80.0, 95.0), AlertPolicy::default());
    let ingestor = IngestorHandle::spawn(MetricIngestor::new(registry.clone(), Some(alerts)));
    let prober = ProberHandle::spawn(registry.clone(), &probe_policy()).unwrap();

    let outcome = ingest(&ingestor, "alpha", 90.0, 40.0).await;
    let alert = assert_matches!(outcome, IngestOutcome::Applied { alert: Some(alert), .. } => alert);
    assert_eq!(alert.await.unwrap(), AlertOutcome::Fired(AlertMetric::Cpu));

    let round = prober.probe_now().await.unwrap();
    assert_eq!(round["alpha"].status, ProbeStatus::Http(200));

    let alpha = registry.lookup("alpha").unwrap().snapshot().await;
    assert_eq!(alpha.cpu, Some(90.0));
    assert_eq!(alpha.memory_load, Some(40.0));
    assert_eq!(alpha.status_code, Some(ProbeStatus::Http(200)));
    // seed + metric update + probe update
    assert_eq!(alpha.score_trend.len(), 3);
    assert_eq!(alpha.status, StatusColor::Green);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].metric, AlertMetric::Cpu);
    assert_eq!(messages[0].server_name, "alpha");
    assert_eq!(messages[0].server, mock_server.address().ip().to_string());
    assert_eq!(messages[0].cpu, Some(90.0));
    assert_eq!(messages[0].memory, Some(40.0));

    prober.shutdown().await;
    ingestor.shutdown().await;
}

#[tokio::test]
async fn test_probe_updates_do_not_evaluate_alerts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let registry = create_registry(vec![("alpha", Some(address_of(&mock_server)))]);
    let store = Arc::new(MemoryStore::with_values([
        (MEMORY_THRESHOLD_KEY, "95"),
        (RECIPIENT_KEY, "ops@example.com"),
    ]));
    let (alerts, notifier) = create_alert_manager(store, AlertPolicy::default());
    let ingestor = IngestorHandle::spawn(MetricIngestor::new(registry.clone(), Some(alerts)));
    let prober = ProberHandle::spawn(registry.clone(), &probe_policy()).unwrap();

    let outcome = ingest(&ingestor, "alpha", 10.0, 99.0).await;
    let alert = assert_matches!(outcome, IngestOutcome::Applied { alert: Some(alert), .. } => alert);
    assert_eq!(alert.await.unwrap(), AlertOutcome::Fired(AlertMetric::Memory));

    for _ in 0..3 {
        prober.probe_now().await.unwrap();
    }
    assert_eq!(notifier.count(), 1);

    // the memory condition is not debounced, so the next metric fires again
    let outcome = ingest(&ingestor, "alpha", 10.0, 99.0).await;
    let alert = assert_matches!(outcome, IngestOutcome::Applied { alert: Some(alert), .. } => alert);
    assert_eq!(alert.await.unwrap(), AlertOutcome::Fired(AlertMetric::Memory));
    assert_eq!(notifier.count(), 2);

    prober.shutdown().await;
    ingestor.shutdown().await;
}

#[tokio::test]
async fn test_cpu_alert_is_debounced_across_events() {
    let registry = create_registry(vec![("alpha", None)]);
    let store = create_alert_store(80.0, 95.0);
    let (alerts, notifier) = create_alert_manager(store.clone(), AlertPolicy::default());
    let ingestor = IngestorHandle::spawn(MetricIngestor::new(registry, Some(alerts)));

    for _ in 0..5 {
        if let IngestOutcome::Applied {
            alert: Some(alert), ..
        } = ingest(&ingestor, "alpha", 95.0, 10.0).await
        {
            alert.await.unwrap();
        }
    }

    assert_eq!(notifier.count(), 1);
    assert!(
        server_health::store::ConfigStore::get(store.as_ref(), LAST_SENT_KEY)
            .await
            .unwrap()
            .is_some()
    );

    ingestor.shutdown().await;
}

#[tokio::test]
async fn test_broadcast_reflects_latest_state() {
    let registry = create_registry(vec![("alpha", None), ("beta", None)]);
    let ingestor = IngestorHandle::spawn(MetricIngestor::new(registry.clone(), None));
    let (snapshot_tx, _) = broadcast::channel(16);
    let broadcaster =
        BroadcasterHandle::spawn(registry.clone(), snapshot_tx, Duration::from_secs(3600));
    let mut frames = broadcaster.subscribe();

    ingest(&ingestor, "beta", 20.0, 30.0).await;
    broadcaster.broadcast_now().await.unwrap();

    let frame = frames.recv().await.unwrap();
    assert_eq!(frame.len(), 2);
    assert_eq!(frame[0].name, "alpha");
    assert_eq!(frame[0].status, StatusColor::Unknown);
    assert_eq!(frame[1].name, "beta");
    assert_eq!(frame[1].cpu, Some(20.0));
    assert_eq!(frame[1].memory_load, Some(30.0));
    assert_ne!(frame[1].status, StatusColor::Unknown);

    let json = serde_json::to_value(frame.as_ref()).unwrap();
    for key in [
        "name",
        "ip",
        "port",
        "path",
        "status",
        "scoreTrend",
        "cpu",
        "memoryLoad",
        "statusCode",
        "latencyMs",
    ] {
        assert!(json[1].get(key).is_some(), "missing {key}");
    }

    broadcaster.shutdown().await;
    ingestor.shutdown().await;
}

#[tokio::test]
async fn test_registry_from_config_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    let addr = mock_server.address();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "servers": {{
                "monitor": {{ "ip": "127.0.0.1", "port": 1 }},
                "web": {{ "ip": "{}", "port": {} }},
                "batch": {{}}
            }},
            "probe": {{ "interval_secs": 3600, "timeout_ms": 1000 }}
        }}"#,
        addr.ip(),
        addr.port()
    )
    .unwrap();

    let config = read_config_file(file.path()).unwrap();
    let registry = Arc::new(ServerRegistry::from_config(&config));

    assert_eq!(registry.len(), 2);
    assert!(registry.lookup("monitor").is_err());

    let prober = ProberHandle::spawn(registry.clone(), &config.probe).unwrap();
    let round = prober.probe_now().await.unwrap();

    assert_eq!(round.len(), 1);
    assert_eq!(round["web"].status, ProbeStatus::Http(200));
    assert_eq!(
        registry.lookup("batch").unwrap().snapshot().await.status_code,
        None
    );

    prober.shutdown().await;
}
