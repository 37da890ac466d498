//! Key/value store holding alert configuration and alert timestamps
//!
//! ## Keys
//!
//! | key                      | value                                  |
//! |--------------------------|----------------------------------------|
//! | `alert_cpu_threshold`    | CPU percentage, absent = disabled      |
//! | `alert_memory_threshold` | memory percentage, absent = disabled   |
//! | `alert_email`            | notification recipient                 |
//! | `alert_last_sent`        | epoch milliseconds of the last alert   |
//! | `alert_last_sent:<name>` | same, when debouncing per server       |
//!
//! All values are strings; [`AlertSettings`] parses them once at the boundary.

pub mod error;
pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::config::{DebounceScope, StoreConfig};

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;

pub const CPU_THRESHOLD_KEY: &str = "alert_cpu_threshold";
pub const MEMORY_THRESHOLD_KEY: &str = "alert_memory_threshold";
pub const RECIPIENT_KEY: &str = "alert_email";
pub const LAST_SENT_KEY: &str = "alert_last_sent";

/// String-valued key/value store
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Open the store selected in the configuration.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn ConfigStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::File { path } => Ok(Arc::new(FileStore::open(path).await?)),
    }
}

/// Key holding the last-sent timestamp for a server under the given scope.
pub fn last_sent_key(scope: DebounceScope, server: &str) -> String {
    match scope {
        DebounceScope::Global => LAST_SENT_KEY.to_string(),
        DebounceScope::PerServer => format!("{LAST_SENT_KEY}:{server}"),
    }
}

/// Typed view of the alert keys
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct AlertSettings {
    pub cpu_threshold: Option<f64>,
    pub memory_threshold: Option<f64>,
    pub recipient: Option<String>,
    pub last_sent: Option<DateTime<Utc>>,
}

impl AlertSettings {
    /// Read and validate the alert keys relevant to one server.
    pub async fn load(
        store: &dyn ConfigStore,
        scope: DebounceScope,
        server: &str,
    ) -> StoreResult<Self> {
        let cpu_threshold = parse_threshold(CPU_THRESHOLD_KEY, store.get(CPU_THRESHOLD_KEY).await?)?;
        let memory_threshold =
            parse_threshold(MEMORY_THRESHOLD_KEY, store.get(MEMORY_THRESHOLD_KEY).await?)?;
        let recipient = store
            .get(RECIPIENT_KEY)
            .await?
            .filter(|recipient| !recipient.trim().is_empty());

        let key = last_sent_key(scope, server);
        let last_sent = parse_timestamp(&key, store.get(&key).await?)?;

        Ok(Self {
            cpu_threshold,
            memory_threshold,
            recipient,
            last_sent,
        })
    }
}

/// Changes to the alert configuration; `None` leaves a key untouched
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct AlertSettingsUpdate {
    #[serde(default, deserialize_with = "explicit_option")]
    pub cpu_threshold: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_option")]
    pub memory_threshold: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_option")]
    pub recipient: Option<Option<String>>,
}

impl AlertSettingsUpdate {
    /// Write the update; an explicit `null` removes the key.
    pub async fn apply(&self, store: &dyn ConfigStore) -> StoreResult<()> {
        if let Some(threshold) = self.cpu_threshold {
            write_or_remove(store, CPU_THRESHOLD_KEY, threshold.map(|v| v.to_string())).await?;
        }
        if let Some(threshold) = self.memory_threshold {
            write_or_remove(store, MEMORY_THRESHOLD_KEY, threshold.map(|v| v.to_string())).await?;
        }
        if let Some(recipient) = &self.recipient {
            write_or_remove(store, RECIPIENT_KEY, recipient.clone()).await?;
        }
        Ok(())
    }
}

fn explicit_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

async fn write_or_remove(
    store: &dyn ConfigStore,
    key: &str,
    value: Option<String>,
) -> StoreResult<()> {
    match value {
        Some(value) => store.set(key, value).await,
        None => store.remove(key).await,
    }
}

fn parse_threshold(key: &str, raw: Option<String>) -> StoreResult<Option<f64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(StoreError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn parse_timestamp(key: &str, raw: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .map(Some)
        .ok_or_else(|| StoreError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
        })
}

/// Encode a timestamp the way `alert_last_sent` stores it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}
