//! Email delivery through the Courier send API

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{AlertMessage, Notifier};

const COURIER_SEND_URL: &str = "https://api.courier.com/send";

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "requestId")]
    request_id: String,
}

#[derive(Debug, Clone)]
pub struct CourierNotifier {
    client: Client,
    token: String,
    template: String,
    url: String,
}

impl CourierNotifier {
    pub fn new(client: Client, token: String, template: String) -> Self {
        Self {
            client,
            token,
            template,
            url: COURIER_SEND_URL.to_string(),
        }
    }

    /// Point the notifier at a different send endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Notifier for CourierNotifier {
    #[instrument(skip(self, alert))]
    async fn send(&self, recipient: Option<&str>, alert: &AlertMessage) -> anyhow::Result<String> {
        let recipient = recipient.context("no alert recipient configured")?;
        let payload = json!({
            "message": {
                "to": { "email": recipient },
                "template": self.template,
                "data": {
                    "metric": alert.metric,
                    "server": alert.server,
                    "cpu": alert.cpu,
                    "memory": alert.memory,
                },
            }
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .context("failed to reach courier")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("courier rejected alert with status {status}: {error_text}");
        }

        let SendResponse { request_id } = response
            .json()
            .await
            .context("failed to parse courier response")?;

        info!("email sent - {request_id}");
        Ok(request_id)
    }
}
