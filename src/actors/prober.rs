//! LatencyProber - Measures latency and availability of every addressed server
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → one task per server → GET http://host:port/path (with timeout)
//!                                  → apply status + latency → rescore
//!     ↑
//!     └─── Commands (ProbeNow, Shutdown)
//! ```
//!
//! Probes run concurrently in a `JoinSet`; a slow target only delays its own task.
//! There is no retry: each round issues at most one request per server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    config::ProbePolicy,
    registry::{ProbeFailure, ProbeOutcome, ProbeStatus, ServerAddress, ServerRegistry},
    scoring::LATENCY_CEILING_MS,
};

use super::messages::{ProbeRound, ProberCommand};

/// Issue a single probe against `address`.
///
/// Any HTTP response counts as reachable. Timeouts and transport errors record
/// [`LATENCY_CEILING_MS`] regardless of the configured timeout.
pub async fn probe_address(
    client: &reqwest::Client,
    address: &ServerAddress,
    timeout: Duration,
) -> ProbeOutcome {
    let url = address.url();
    trace!("probing {url}");

    let start = Instant::now();
    let result = tokio::time::timeout(timeout, client.get(&url).send()).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let failure = match result {
        Ok(Ok(response)) => {
            return ProbeOutcome {
                status: ProbeStatus::Http(response.status().as_u16()),
                latency_ms: elapsed_ms,
            };
        }
        Ok(Err(e)) if e.is_timeout() => ProbeFailure::Timeout,
        Ok(Err(e)) if e.is_connect() => {
            trace!("connection to {url} failed: {e}");
            ProbeFailure::Connect
        }
        Ok(Err(e)) => {
            trace!("request to {url} failed: {e}");
            ProbeFailure::Request
        }
        Err(_) => ProbeFailure::Timeout,
    };

    ProbeOutcome {
        status: ProbeStatus::Failed(failure),
        latency_ms: LATENCY_CEILING_MS,
    }
}

#[derive(Clone)]
pub struct LatencyProber {
    registry: Arc<ServerRegistry>,
    client: reqwest::Client,
    timeout: Duration,
}

impl LatencyProber {
    pub fn new(registry: Arc<ServerRegistry>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            registry,
            client,
            timeout,
        })
    }

    /// Probe every addressed server once, concurrently, and apply the results.
    #[instrument(skip(self))]
    pub async fn probe_all(&self) -> ProbeRound {
        let mut probes = JoinSet::new();

        for server in self.registry.all() {
            let Some(address) = server.address().cloned() else {
                continue;
            };
            let server = server.clone();
            let client = self.client.clone();
            let timeout = self.timeout;

            probes.spawn(async move {
                let outcome = probe_address(&client, &address, timeout).await;
                server.apply_probe(outcome).await;
                (server.name().to_string(), outcome)
            });
        }

        let mut round = ProbeRound::new();
        while let Some(result) = probes.join_next().await {
            match result {
                Ok((name, outcome)) => {
                    if let ProbeStatus::Failed(failure) = outcome.status {
                        warn!("probe of {name} failed: {failure:?}");
                    }
                    round.insert(name, outcome);
                }
                Err(e) => error!("probe task failed: {e}"),
            }
        }

        trace!("probe round finished for {} servers", round.len());
        round
    }
}

struct ProberActor {
    prober: LatencyProber,
    command_rx: mpsc::Receiver<ProberCommand>,
    interval_duration: Duration,
}

impl ProberActor {
    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting prober actor");

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.prober.probe_all().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ProberCommand::ProbeNow { respond_to } => {
                            debug!("received ProbeNow command");
                            let round = self.prober.probe_all().await;
                            let _ = respond_to.send(round);
                        }

                        ProberCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("prober actor stopped");
    }
}

/// Handle for controlling the prober actor
#[derive(Clone)]
pub struct ProberHandle {
    sender: mpsc::Sender<ProberCommand>,
}

impl ProberHandle {
    pub fn spawn(registry: Arc<ServerRegistry>, policy: &ProbePolicy) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = ProberActor {
            prober: LatencyProber::new(registry, policy.timeout())?,
            command_rx: cmd_rx,
            interval_duration: policy.interval(),
        };
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    /// Run a probe round now and return its results.
    pub async fn probe_now(&self) -> Result<ProbeRound> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ProberCommand::ProbeNow { respond_to: tx })
            .await
            .context("failed to send ProbeNow command")?;

        rx.await.context("prober dropped the response")
    }

    pub async fn shutdown(self) {
        let _ = self.sender.send(ProberCommand::Shutdown).await;
    }
}
