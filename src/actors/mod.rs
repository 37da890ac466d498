//! Actors driving the monitoring engine
//!
//! Each actor runs as an independent tokio task and is controlled through a cloneable
//! handle wrapping its mpsc command channel.
//!
//! ```text
//!   agents ──► MetricIngestor ──┐                 ┌──► AlertManager ──► Notifier
//!                               ├──► registry ────┤
//!   timer ───► LatencyProber ───┘   (rescored)    │
//!                                                 │
//!   timer ───► SnapshotBroadcaster ◄──────────────┘ ──► broadcast channel ──► viewers
//! ```
//!
//! - **MetricIngestor**: applies pushed cpu/memory readings and triggers alert evaluation
//! - **LatencyProber**: probes every addressed server on a fixed interval
//! - **SnapshotBroadcaster**: publishes the full registry snapshot on a fixed interval

pub mod broadcaster;
pub mod ingestor;
pub mod messages;
pub mod prober;

pub use broadcaster::{BroadcasterHandle, SnapshotBroadcaster, SnapshotFrame};
pub use ingestor::{IngestorHandle, MetricIngestor};
pub use messages::{IngestOutcome, MetricEvent, ProbeRound};
pub use prober::{LatencyProber, ProberHandle};
