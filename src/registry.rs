//! Registry of monitored servers
//!
//! Membership is fixed at construction. Each server owns its mutable health state behind
//! its own lock, so metric updates and probe updates for the same server serialize while
//! different servers never contend.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    MetricPayload,
    config::{Config, TargetConfig},
    scoring::{HealthScorer, ScoreInputs, ScoreTrend, StatusColor},
};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no monitored server named '{0}'")]
    NotFound(String),
}

/// Probe target of a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl ServerAddress {
    pub fn url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.path)
    }
}

/// Reason a probe produced no HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeFailure {
    #[serde(rename = "ETIMEDOUT")]
    Timeout,
    #[serde(rename = "ECONNREFUSED")]
    Connect,
    #[serde(rename = "EREQUEST")]
    Request,
}

/// Status code of the most recent probe
///
/// Serializes as the numeric HTTP status, or as an error code string for failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProbeStatus {
    Http(u16),
    Failed(ProbeFailure),
}

impl ProbeStatus {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProbeStatus::Http(code) => Some(*code),
            ProbeStatus::Failed(_) => None,
        }
    }
}

/// Result of one probe attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub latency_ms: f64,
}

/// Mutable health fields of a server
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    pub cpu: Option<f64>,
    pub memory_load: Option<f64>,
    pub probe: Option<ProbeStatus>,
    pub latency_ms: Option<f64>,
    pub status: StatusColor,
    pub score_trend: ScoreTrend,
}

impl HealthState {
    pub fn score_inputs(&self) -> ScoreInputs {
        ScoreInputs {
            cpu: self.cpu,
            memory_load: self.memory_load,
            http_status: self.probe.and_then(|probe| probe.http_status()),
            latency_ms: self.latency_ms,
        }
    }
}

/// Serialized view of a server as sent to viewers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub name: String,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub status: StatusColor,
    pub score_trend: Vec<f64>,
    pub cpu: Option<f64>,
    pub memory_load: Option<f64>,
    pub status_code: Option<ProbeStatus>,
    pub latency_ms: Option<f64>,
}

#[derive(Debug)]
pub struct MonitoredServer {
    name: String,
    address: Option<ServerAddress>,
    state: Mutex<HealthState>,
}

impl MonitoredServer {
    pub fn new(name: impl Into<String>, address: Option<ServerAddress>) -> Self {
        Self {
            name: name.into(),
            address,
            state: Mutex::new(HealthState::default()),
        }
    }

    fn from_target(name: &str, target: &TargetConfig) -> Self {
        let address = target.ip.as_ref().map(|host| ServerAddress {
            host: host.clone(),
            port: target.port.unwrap_or(DEFAULT_PORT),
            path: target.path.clone().unwrap_or_default(),
        });

        Self::new(name, address)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Option<&ServerAddress> {
        self.address.as_ref()
    }

    /// Overwrite cpu and memory load, then rescore.
    pub async fn apply_metrics(&self, payload: MetricPayload) -> ServerSnapshot {
        let mut state = self.state.lock().await;
        state.cpu = Some(payload.cpu);
        state.memory_load = Some(payload.memory_load);
        HealthScorer::recompute(&mut state);
        self.snapshot_of(&state)
    }

    /// Overwrite probe status and latency, then rescore.
    pub async fn apply_probe(&self, outcome: ProbeOutcome) -> ServerSnapshot {
        let mut state = self.state.lock().await;
        state.probe = Some(outcome.status);
        state.latency_ms = Some(outcome.latency_ms);
        HealthScorer::recompute(&mut state);
        self.snapshot_of(&state)
    }

    pub async fn snapshot(&self) -> ServerSnapshot {
        let state = self.state.lock().await;
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &HealthState) -> ServerSnapshot {
        ServerSnapshot {
            name: self.name.clone(),
            ip: self.address.as_ref().map(|address| address.host.clone()),
            port: self.address.as_ref().map(|address| address.port),
            path: self.address.as_ref().map(|address| address.path.clone()),
            status: state.status,
            score_trend: state.score_trend.iter().copied().collect(),
            cpu: state.cpu,
            memory_load: state.memory_load,
            status_code: state.probe,
            latency_ms: state.latency_ms,
        }
    }
}

/// Fixed set of monitored servers
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: Vec<Arc<MonitoredServer>>,
    index: HashMap<String, usize>,
}

impl ServerRegistry {
    pub fn new(servers: impl IntoIterator<Item = MonitoredServer>) -> Self {
        let mut registry = Self::default();

        for server in servers {
            if registry.index.contains_key(server.name()) {
                debug!("ignoring duplicate server '{}'", server.name());
                continue;
            }
            registry
                .index
                .insert(server.name().to_string(), registry.servers.len());
            registry.servers.push(Arc::new(server));
        }

        registry
    }

    pub fn from_config(config: &Config) -> Self {
        let registry = Self::new(
            config
                .targets()
                .map(|(name, target)| MonitoredServer::from_target(name, target)),
        );
        debug!("registry created with {} servers", registry.len());
        registry
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<MonitoredServer>, RegistryError> {
        self.index
            .get(name)
            .map(|idx| self.servers[*idx].clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn all(&self) -> &[Arc<MonitoredServer>] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Snapshot every server in registry order.
    pub async fn snapshot(&self) -> Vec<ServerSnapshot> {
        let mut snapshots = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            snapshots.push(server.snapshot().await);
        }
        snapshots
    }
}
