//! Message types for actor communication
//!
//! Commands are sent to a specific actor via mpsc. Queries carry a oneshot sender for
//! the reply.

use std::collections::BTreeMap;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{
    alerts::AlertOutcome,
    registry::{ProbeOutcome, ServerSnapshot},
};

/// A raw metric message as delivered by the transport
///
/// The channel is the name of the server the agent reports for. The payload is left
/// unparsed so malformed messages can be dropped by the ingestor instead of the transport.
#[derive(Debug, Clone)]
pub struct MetricEvent {
    pub channel: String,
    pub payload: String,
}

impl MetricEvent {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// What happened to one metric event
#[derive(Debug)]
pub enum IngestOutcome {
    /// The entry was updated and rescored.
    ///
    /// `alert` is the spawned alert evaluation, if alerting is enabled.
    Applied {
        snapshot: ServerSnapshot,
        alert: Option<JoinHandle<AlertOutcome>>,
    },

    /// No server with this name; the event was dropped
    UnknownChannel,

    /// The payload could not be parsed; the event was dropped
    Malformed,
}

/// Commands that can be sent to the MetricIngestor actor
#[derive(Debug)]
pub enum IngestorCommand {
    /// Apply an event without waiting for the result
    Publish(MetricEvent),

    /// Apply an event and report the outcome
    IngestNow {
        event: MetricEvent,
        respond_to: oneshot::Sender<IngestOutcome>,
    },

    Shutdown,
}

/// Probe results of one round, keyed by server name
pub type ProbeRound = BTreeMap<String, ProbeOutcome>;

/// Commands that can be sent to the LatencyProber actor
#[derive(Debug)]
pub enum ProberCommand {
    /// Run a probe round immediately (bypassing the interval timer)
    ProbeNow {
        respond_to: oneshot::Sender<ProbeRound>,
    },

    Shutdown,
}

/// Commands that can be sent to the SnapshotBroadcaster actor
#[derive(Debug)]
pub enum BroadcasterCommand {
    /// Publish a snapshot immediately, replying with the number of receivers
    BroadcastNow { respond_to: oneshot::Sender<usize> },

    Shutdown,
}
