pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod notify;
pub mod registry;
pub mod scoring;
pub mod store;
pub mod util;

use serde::{Deserialize, Serialize};

/// Body of a metric event pushed by an agent.
///
/// Values are taken as-is: nothing clamps them to 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    pub cpu: f64,
    #[serde(rename = "memoryLoad")]
    pub memory_load: f64,
}

impl MetricPayload {
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}
