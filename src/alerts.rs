//! Threshold alerting with debounce
//!
//! An alert fires when
//!
//! ```text
//! (debounce window elapsed AND cpu threshold set AND cpu > cpu threshold)
//!     OR
//! (memory threshold set AND memory > memory threshold)
//! ```
//!
//! The memory condition ignores the debounce window unless `gate_memory` is enabled.
//! Which timestamp the window is measured against depends on the
//! [`DebounceScope`](crate::config::DebounceScope).
//!
//! Reading the settings, deciding and writing the new timestamp happen under one lock, so
//! near-simultaneous evaluations cannot both pass the same window.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    config::AlertPolicy,
    notify::{AlertMessage, Notifier},
    registry::ServerSnapshot,
    store::{AlertSettings, ConfigStore, format_timestamp, last_sent_key},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlertMetric {
    #[serde(rename = "CPU")]
    Cpu,
    Memory,
}

impl fmt::Display for AlertMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertMetric::Cpu => write!(f, "CPU"),
            AlertMetric::Memory => write!(f, "Memory"),
        }
    }
}

/// Result of evaluating one server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// No threshold breached, or debounced
    Quiet,

    /// An alert was dispatched for the given metric
    Fired(AlertMetric),

    /// The store could not be read or written; nothing was sent
    Abandoned,
}

/// Whether the debounce window has passed since the last alert.
///
/// Never having sent an alert counts as elapsed.
pub fn debounce_elapsed(
    last_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> bool {
    last_sent.is_none_or(|last_sent| now - last_sent >= window)
}

fn exceeds(value: Option<f64>, threshold: Option<f64>) -> bool {
    matches!((value, threshold), (Some(value), Some(threshold)) if value > threshold)
}

/// CPU condition: gated by the debounce window.
pub fn cpu_alert_due(settings: &AlertSettings, cpu: Option<f64>, window_elapsed: bool) -> bool {
    window_elapsed && exceeds(cpu, settings.cpu_threshold)
}

/// Memory condition: only gated by the debounce window when `gate_memory` is set.
pub fn memory_alert_due(
    settings: &AlertSettings,
    memory_load: Option<f64>,
    window_elapsed: bool,
    gate_memory: bool,
) -> bool {
    (window_elapsed || !gate_memory) && exceeds(memory_load, settings.memory_threshold)
}

/// Decide which metric, if any, an alert should be sent for. CPU wins ties.
pub fn decide(
    settings: &AlertSettings,
    cpu: Option<f64>,
    memory_load: Option<f64>,
    now: DateTime<Utc>,
    policy: &AlertPolicy,
) -> Option<AlertMetric> {
    let window_elapsed = debounce_elapsed(settings.last_sent, now, policy.window());

    if cpu_alert_due(settings, cpu, window_elapsed) {
        Some(AlertMetric::Cpu)
    } else if memory_alert_due(settings, memory_load, window_elapsed, policy.gate_memory) {
        Some(AlertMetric::Memory)
    } else {
        None
    }
}

pub struct AlertManager {
    store: Arc<dyn ConfigStore>,
    notifier: Arc<dyn Notifier>,
    policy: AlertPolicy,
    decision_lock: Mutex<()>,
}

impl AlertManager {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn Notifier>,
        policy: AlertPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
            decision_lock: Mutex::new(()),
        }
    }

    /// Evaluate a freshly updated server against the configured thresholds.
    pub async fn evaluate(&self, server: &ServerSnapshot) -> AlertOutcome {
        self.evaluate_at(server, Utc::now()).await
    }

    #[instrument(skip(self, server), fields(server = %server.name))]
    pub async fn evaluate_at(&self, server: &ServerSnapshot, now: DateTime<Utc>) -> AlertOutcome {
        let (metric, recipient) = {
            let _guard = self.decision_lock.lock().await;

            let settings =
                match AlertSettings::load(self.store.as_ref(), self.policy.debounce, &server.name)
                    .await
                {
                    Ok(settings) => settings,
                    Err(e) => {
                        warn!("abandoning alert evaluation: {e}");
                        return AlertOutcome::Abandoned;
                    }
                };

            if let Some(last_sent) = settings.last_sent {
                trace!("last alert sent at {}", last_sent.to_rfc3339());
            }

            let Some(metric) = decide(
                &settings,
                server.cpu,
                server.memory_load,
                now,
                &self.policy,
            ) else {
                return AlertOutcome::Quiet;
            };

            if settings.recipient.is_none() {
                debug!("{metric} threshold breached but no recipient configured");
            }

            let key = last_sent_key(self.policy.debounce, &server.name);
            if let Err(e) = self.store.set(&key, format_timestamp(now)).await {
                warn!("abandoning alert, failed to record send time: {e}");
                return AlertOutcome::Abandoned;
            }

            (metric, settings.recipient)
        };

        let message = AlertMessage {
            metric,
            server_name: server.name.clone(),
            server: server.ip.clone().unwrap_or_else(|| server.name.clone()),
            cpu: server.cpu,
            memory: server.memory_load,
        };

        debug!("{}", message.summary());

        match self.notifier.send(recipient.as_deref(), &message).await {
            Ok(delivery_id) => info!("alert sent - {delivery_id}"),
            Err(e) => error!("failed to send alert: {e:#}"),
        }

        AlertOutcome::Fired(metric)
    }
}
