//! SnapshotBroadcaster - Publishes the registry to viewers on a fixed cadence
//!
//! The broadcast is independent of update traffic: every tick sends the complete
//! snapshot, whether or not anything changed. Slow subscribers may lag and miss frames,
//! which is fine since the next frame is a full replacement.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, instrument, trace, warn};

use crate::registry::{ServerRegistry, ServerSnapshot};

use super::messages::BroadcasterCommand;

/// One broadcast frame: every server in registry order
pub type SnapshotFrame = Arc<Vec<ServerSnapshot>>;

#[derive(Clone)]
pub struct SnapshotBroadcaster {
    registry: Arc<ServerRegistry>,
    snapshot_tx: broadcast::Sender<SnapshotFrame>,
}

impl SnapshotBroadcaster {
    pub fn new(registry: Arc<ServerRegistry>, snapshot_tx: broadcast::Sender<SnapshotFrame>) -> Self {
        Self {
            registry,
            snapshot_tx,
        }
    }

    /// Snapshot the registry and publish it, returning the number of receivers.
    pub async fn broadcast_once(&self) -> usize {
        let frame = Arc::new(self.registry.snapshot().await);

        // no receivers just means nobody is watching right now
        match self.snapshot_tx.send(frame) {
            Ok(num_receivers) => {
                trace!("published snapshot to {num_receivers} receivers");
                num_receivers
            }
            Err(_) => {
                trace!("no receivers for snapshot");
                0
            }
        }
    }
}

struct BroadcasterActor {
    broadcaster: SnapshotBroadcaster,
    command_rx: mpsc::Receiver<BroadcasterCommand>,
    interval_duration: Duration,
}

impl BroadcasterActor {
    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting broadcaster actor");

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.broadcaster.broadcast_once().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        BroadcasterCommand::BroadcastNow { respond_to } => {
                            let receivers = self.broadcaster.broadcast_once().await;
                            let _ = respond_to.send(receivers);
                        }

                        BroadcasterCommand::Shutdown => {
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

        debug!("broadcaster actor stopped");
    }
}

/// Handle for controlling the broadcaster actor
#[derive(Clone)]
pub struct BroadcasterHandle {
    sender: mpsc::Sender<BroadcasterCommand>,
    snapshot_tx: broadcast::Sender<SnapshotFrame>,
}

impl BroadcasterHandle {
    pub fn spawn(
        registry: Arc<ServerRegistry>,
        snapshot_tx: broadcast::Sender<SnapshotFrame>,
        interval_duration: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = BroadcasterActor {
            broadcaster: SnapshotBroadcaster::new(registry, snapshot_tx.clone()),
            command_rx: cmd_rx,
            interval_duration,
        };
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            snapshot_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotFrame> {
        self.snapshot_tx.subscribe()
    }

    pub async fn broadcast_now(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BroadcasterCommand::BroadcastNow { respond_to: tx })
            .await
            .context("failed to send BroadcastNow command")?;

        rx.await.context("broadcaster dropped the response")
    }

    pub async fn shutdown(self) {
        let _ = self.sender.send(BroadcasterCommand::Shutdown).await;
    }
}
