use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::TimeDelta;
use tracing::{debug, trace};

/// Target name the hub uses for itself; never monitored.
pub const RESERVED_TARGET: &str = "monitor";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Monitored targets keyed by server name
    pub servers: BTreeMap<String, TargetConfig>,

    #[serde(default)]
    pub alerts: AlertPolicy,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub probe: ProbePolicy,

    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
}

impl Config {
    /// Targets that should end up in the registry.
    pub fn targets(&self) -> impl Iterator<Item = (&String, &TargetConfig)> {
        self.servers
            .iter()
            .filter(|(name, _)| name.as_str() != RESERVED_TARGET)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct TargetConfig {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

/// Which timestamp an alert debounces against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceScope {
    /// One shared "last sent" timestamp for every server
    #[default]
    Global,

    /// Each server keeps its own "last sent" timestamp
    PerServer,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct AlertPolicy {
    #[serde(default)]
    pub debounce: DebounceScope,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Route the memory condition through the debounce window as well
    #[serde(default)]
    pub gate_memory: bool,
}

impl AlertPolicy {
    /// The debounce window, or `None` when `window_secs` does not fit a `TimeDelta`.
    pub fn try_window(&self) -> Option<TimeDelta> {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }

    /// The debounce window; out-of-range values saturate to the largest window.
    pub fn window(&self) -> TimeDelta {
        self.try_window().unwrap_or(TimeDelta::MAX)
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            debounce: DebounceScope::default(),
            window_secs: default_window_secs(),
            gate_memory: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Only log alerts
    #[default]
    Log,

    /// Courier send API, authenticated through `COURIER_AUTH_TOKEN`
    Courier { template: String },

    Webhook { url: String },

    Discord { url: String, user_id: Option<String> },
}

/// Backend holding alert thresholds and last-sent timestamps
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory store (lost on restart)
    #[default]
    Memory,

    /// JSON file rewritten on every change
    File {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct ProbePolicy {
    #[serde(default = "default_probe_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl ProbePolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval_secs(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./alert-state.json")
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_probe_interval_secs() -> u64 {
    10
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_broadcast_interval_ms() -> u64 {
    1000
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("missing required configuration file {}", path.display()))?;
    let config: Config = serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {}", path.display()))?;

    if config.probe.interval_secs == 0 || config.broadcast_interval_ms == 0 {
        anyhow::bail!("probe and broadcast intervals must be greater than zero");
    }

    if config.alerts.try_window().is_none() {
        anyhow::bail!(
            "alert window of {} seconds is out of range",
            config.alerts.window_secs
        );
    }

    if config.servers.contains_key(RESERVED_TARGET) {
        debug!("skipping reserved target '{RESERVED_TARGET}'");
    }
    trace!("loaded config: {config:?}");

    Ok(config)
}
