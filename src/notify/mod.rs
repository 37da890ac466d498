//! Alert delivery
//!
//! A [`Notifier`] delivers one alert and reports a delivery id. The recipient is whatever
//! address is configured in the store; notifiers that cannot deliver without one fail.
//! Delivery failures are returned to the caller, which logs them; they never stop
//! ingestion, probing or scoring.

pub mod courier;
pub mod discord;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::{alerts::AlertMetric, config::NotifierConfig, util::get_courier_token};

pub use courier::CourierNotifier;
pub use discord::DiscordNotifier;
pub use webhook::WebhookNotifier;

/// Content of an alert notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub metric: AlertMetric,
    /// Name of the server in the registry
    pub server_name: String,
    /// Address of the server (falls back to its name when it has none)
    pub server: String,
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
}

impl AlertMessage {
    pub fn summary(&self) -> String {
        format!(
            "{} alert on {} ({}): cpu {}, memory {}",
            self.metric,
            self.server_name,
            self.server,
            format_percent(self.cpu),
            format_percent(self.memory)
        )
    }
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| format!("{value:.1}%"))
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert, returning an id for the delivery.
    async fn send(&self, recipient: Option<&str>, alert: &AlertMessage) -> anyhow::Result<String>;
}

/// Notifier that only writes alerts to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: Option<&str>, alert: &AlertMessage) -> anyhow::Result<String> {
        warn!(
            "{} (recipient: {})",
            alert.summary(),
            recipient.unwrap_or("none")
        );
        Ok(format!("log-{}", chrono::Utc::now().timestamp_millis()))
    }
}

/// Build the notifier selected in the configuration.
pub fn build_notifier(config: &NotifierConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let notifier: Arc<dyn Notifier> = match config {
        NotifierConfig::Log => Arc::new(LogNotifier),
        NotifierConfig::Courier { template } => {
            let token = get_courier_token()
                .context("COURIER_AUTH_TOKEN must be set for the courier notifier")?;
            Arc::new(CourierNotifier::new(client, token, template.clone()))
        }
        NotifierConfig::Webhook { url } => Arc::new(WebhookNotifier::new(client, url.clone())),
        NotifierConfig::Discord { url, user_id } => {
            Arc::new(DiscordNotifier::new(client, url.clone(), user_id.clone()))
        }
    };

    Ok(notifier)
}

#[cfg(test)]
pub(crate) fn test_message(metric: AlertMetric) -> AlertMessage {
    AlertMessage {
        metric,
        server_name: "alpha".to_string(),
        server: "10.0.0.1".to_string(),
        cpu: Some(91.5),
        memory: Some(42.0),
    }
}
