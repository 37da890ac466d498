use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use server_health::{
    actors::{BroadcasterHandle, IngestorHandle, MetricIngestor, ProberHandle},
    alerts::AlertManager,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::read_config_file,
    notify::build_notifier,
    registry::ServerRegistry,
    store::open_store,
};
use tokio::sync::broadcast;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("server_health", LevelFilter::DEBUG),
        ("health_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let registry = Arc::new(ServerRegistry::from_config(&config));
    if registry.is_empty() {
        warn!("no servers configured, nothing will be monitored");
    }

    let store = open_store(&config.store)
        .await
        .context("failed to open alert store")?;
    let notifier = build_notifier(&config.notifier)?;
    let alerts = Arc::new(AlertManager::new(store.clone(), notifier, config.alerts));

    let ingestor = IngestorHandle::spawn(MetricIngestor::new(registry.clone(), Some(alerts)));
    let prober = ProberHandle::spawn(registry.clone(), &config.probe)?;

    let (snapshot_tx, _) = broadcast::channel(16);
    let broadcaster =
        BroadcasterHandle::spawn(registry.clone(), snapshot_tx.clone(), config.broadcast_interval());

    let state = ApiState::new(
        registry.clone(),
        ingestor.clone(),
        store,
        config.alerts,
        snapshot_tx,
    );
    let addr = spawn_api_server(ApiConfig::from(&config.api), state).await?;
    info!("monitoring {} servers, API on {addr}", registry.len());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    debug!("shutting down");

    prober.shutdown().await;
    broadcaster.shutdown().await;
    ingestor.shutdown().await;

    Ok(())
}
