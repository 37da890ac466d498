//! MetricIngestor - Applies metrics pushed by agents
//!
//! ## Message Flow
//!
//! ```text
//! MetricEvent → parse payload → lookup server → overwrite cpu/memory → rescore
//!                                                                    └─► spawn alert evaluation
//! ```
//!
//! Unknown channels and malformed payloads are dropped; the next event is processed
//! as usual. Alert evaluation runs in its own task so a slow store never holds up
//! ingestion.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::{MetricPayload, alerts::AlertManager, registry::ServerRegistry};

use super::messages::{IngestOutcome, IngestorCommand, MetricEvent};

#[derive(Clone)]
pub struct MetricIngestor {
    registry: Arc<ServerRegistry>,
    alerts: Option<Arc<AlertManager>>,
}

impl MetricIngestor {
    pub fn new(registry: Arc<ServerRegistry>, alerts: Option<Arc<AlertManager>>) -> Self {
        Self { registry, alerts }
    }

    #[instrument(skip(self, payload))]
    pub async fn on_metric_event(&self, channel: &str, payload: &str) -> IngestOutcome {
        let Ok(server) = self.registry.lookup(channel) else {
            trace!("dropping metrics for unknown channel");
            return IngestOutcome::UnknownChannel;
        };

        let metrics = match MetricPayload::parse(payload) {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("dropping malformed metric payload: {e}");
                return IngestOutcome::Malformed;
            }
        };

        let snapshot = server.apply_metrics(metrics).await;
        trace!(
            "applied cpu {:.1}% memory {:.1}%, status {}",
            metrics.cpu,
            metrics.memory_load,
            snapshot.status.hex()
        );

        let alert = self.alerts.clone().map(|alerts| {
            let snapshot = snapshot.clone();
            tokio::spawn(async move { alerts.evaluate(&snapshot).await })
        });

        IngestOutcome::Applied { snapshot, alert }
    }
}

struct IngestorActor {
    ingestor: MetricIngestor,
    command_rx: mpsc::Receiver<IngestorCommand>,
}

impl IngestorActor {
    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting ingestor actor");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                IngestorCommand::Publish(event) => {
                    self.ingestor
                        .on_metric_event(&event.channel, &event.payload)
                        .await;
                }

                IngestorCommand::IngestNow { event, respond_to } => {
                    let outcome = self
                        .ingestor
                        .on_metric_event(&event.channel, &event.payload)
                        .await;
                    let _ = respond_to.send(outcome);
                }

                IngestorCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        debug!("ingestor actor stopped");
    }
}

/// Handle for feeding metric events to the ingestor actor
#[derive(Clone)]
pub struct IngestorHandle {
    sender: mpsc::Sender<IngestorCommand>,
}

impl IngestorHandle {
    pub fn spawn(ingestor: MetricIngestor) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);

        let actor = IngestorActor {
            ingestor,
            command_rx: cmd_rx,
        };
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Queue a metric event.
    pub async fn publish(&self, event: MetricEvent) -> Result<()> {
        self.sender
            .send(IngestorCommand::Publish(event))
            .await
            .context("failed to send Publish command")
    }

    /// Apply a metric event and wait for the outcome.
    pub async fn ingest_now(&self, event: MetricEvent) -> Result<IngestOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(IngestorCommand::IngestNow {
                event,
                respond_to: tx,
            })
            .await
            .context("failed to send IngestNow command")?;

        rx.await.context("ingestor dropped the response")
    }

    pub async fn shutdown(self) {
        let _ = self.sender.send(IngestorCommand::Shutdown).await;
    }
}
