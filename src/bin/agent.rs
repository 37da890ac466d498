use std::time::Duration;

use anyhow::Context;
use server_health::{
    MetricPayload,
    util::{get_agent_interval, get_agent_name, get_hub_url},
};
use sysinfo::System;
use tracing::{debug, error, instrument, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new()
        .with_target("health_agent", tracing::metadata::LevelFilter::TRACE)
        .with_target("server_health", tracing::metadata::LevelFilter::DEBUG);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(true),
        )
        .with(filter)
        .init();
}

/// Sample overall CPU usage and memory load in percent.
fn sample(sys: &mut System) -> MetricPayload {
    sys.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let memory_load = if sys.total_memory() == 0 {
        0.0
    } else {
        sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
    };

    MetricPayload {
        cpu: sys.global_cpu_usage() as f64,
        memory_load,
    }
}

#[instrument(skip(client, payload))]
async fn push(client: &reqwest::Client, url: &str, payload: &MetricPayload) -> anyhow::Result<()> {
    let response = client
        .post(url)
        .json(payload)
        .send()
        .await
        .context("failed to reach hub")?;

    if !response.status().is_success() {
        anyhow::bail!("hub rejected metrics with status {}", response.status());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let name = get_agent_name().context("AGENT_NAME is not set and no host name is available")?;
    let url = format!("{}/api/v1/metrics/{name}", get_hub_url().trim_end_matches('/'));
    let interval = Duration::from_secs(get_agent_interval().max(1));
    debug!("reporting as {name} to {url} every {interval:?}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;

    let mut sys = System::new_all();
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        let payload = tokio::task::block_in_place(|| sample(&mut sys));
        trace!("cpu {:.1}% memory {:.1}%", payload.cpu, payload.memory_load);

        if let Err(e) = push(&client, &url, &payload).await {
            error!("{e:#}");
        }
    }
}
