use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::{AlertMessage, Notifier};

/// Posts alerts as JSON to a generic webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, alert), fields(url = %self.url))]
    async fn send(&self, recipient: Option<&str>, alert: &AlertMessage) -> anyhow::Result<String> {
        let payload = json!({
            "recipient": recipient,
            "metric": alert.metric,
            "server": alert.server,
            "server_name": alert.server_name,
            "cpu": alert.cpu,
            "memory": alert.memory,
            "message": alert.summary(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("webhook alert failed with status: {status}");
        }

        // receivers may answer with an id, otherwise fall back to the status
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        let delivery_id = match body.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => format!("webhook-{}", status.as_u16()),
        };

        info!("successfully sent webhook alert ({delivery_id})");
        Ok(delivery_id)
    }
}
