//! API response types

use serde::{Deserialize, Serialize};

use crate::{
    config::{AlertPolicy, DebounceScope},
    store::AlertSettings,
};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub servers: usize,
}

/// Current alert configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertConfigResponse {
    pub cpu_threshold: Option<f64>,
    pub memory_threshold: Option<f64>,
    pub recipient: Option<String>,
    pub debounce: DebounceScope,
    pub window_secs: u64,
    pub gate_memory: bool,
}

impl AlertConfigResponse {
    pub fn new(settings: AlertSettings, policy: &AlertPolicy) -> Self {
        Self {
            cpu_threshold: settings.cpu_threshold,
            memory_threshold: settings.memory_threshold,
            recipient: settings.recipient,
            debounce: policy.debounce,
            window_secs: policy.window_secs,
            gate_memory: policy.gate_memory,
        }
    }
}
