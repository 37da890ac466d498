//! API shared state

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{
    actors::{IngestorHandle, SnapshotFrame},
    config::AlertPolicy,
    registry::ServerRegistry,
    store::ConfigStore,
};

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<ServerRegistry>,

    /// Receives metrics pushed by agents
    pub ingestor: IngestorHandle,

    /// Store holding alert thresholds and recipient
    pub store: Arc<dyn ConfigStore>,

    pub alert_policy: AlertPolicy,

    /// Broadcast sender for snapshot frames (for WebSocket streaming)
    pub snapshot_tx: broadcast::Sender<SnapshotFrame>,
}

impl ApiState {
    pub fn new(
        registry: Arc<ServerRegistry>,
        ingestor: IngestorHandle,
        store: Arc<dyn ConfigStore>,
        alert_policy: AlertPolicy,
        snapshot_tx: broadcast::Sender<SnapshotFrame>,
    ) -> Self {
        Self {
            registry,
            ingestor,
            store,
            alert_policy,
            snapshot_tx,
        }
    }
}
