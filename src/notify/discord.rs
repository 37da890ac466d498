use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use super::{AlertMessage, Notifier};
use crate::alerts::AlertMetric;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Posts alerts as embeds to a Discord webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    url: String,
    user_id: Option<String>,
}

impl DiscordNotifier {
    pub fn new(client: Client, url: String, user_id: Option<String>) -> Self {
        Self {
            client,
            url,
            user_id,
        }
    }

    pub fn build_alert_embed(&self, recipient: Option<&str>, alert: &AlertMessage) -> Embed {
        let (title, color) = match alert.metric {
            AlertMetric::Cpu => ("⚠️ CPU Usage Alert", 15105570),   // Orange
            AlertMetric::Memory => ("🔥 Memory Alert", 15158332), // Red
        };

        Embed {
            title: Some(title.to_string()),
            description: Some(format!(
                "Server **{}** has exceeded its {} threshold!",
                alert.server_name, alert.metric
            )),
            color: Some(color),
            fields: vec![
                EmbedField {
                    name: "💻 CPU".to_string(),
                    value: create_progress_bar(alert.cpu),
                    inline: false,
                },
                EmbedField {
                    name: "🧠 Memory".to_string(),
                    value: create_progress_bar(alert.memory),
                    inline: false,
                },
            ],
            footer: Some(EmbedFooter {
                text: match recipient {
                    Some(recipient) => {
                        format!("Server: {} | {} | {}", alert.server_name, alert.server, recipient)
                    }
                    None => format!("Server: {} | {}", alert.server_name, alert.server),
                },
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }
}

fn create_progress_bar(load: Option<f64>) -> String {
    let Some(load) = load else {
        return "n/a".to_string();
    };

    let filled = ((load / 10.0).max(0.0) as usize).min(10);
    let bar = "█".repeat(filled) + &"░".repeat(10 - filled);
    let status_emoji = if load >= 90.0 {
        "🔴"
    } else if load >= 75.0 {
        "🟠"
    } else if load >= 50.0 {
        "🟡"
    } else {
        "🟢"
    };

    format!("{status_emoji} `{bar}` {load:.1}%")
}

#[async_trait]
impl Notifier for DiscordNotifier {
    #[instrument(skip(self, alert))]
    async fn send(&self, recipient: Option<&str>, alert: &AlertMessage) -> anyhow::Result<String> {
        let mut message_builder =
            MessageBuilder::new().add_embed(self.build_alert_embed(recipient, alert));
        if let Some(user_id) = &self.user_id {
            message_builder =
                message_builder.content(format!("🚨 ({}) <@{user_id}>", alert.server_name));
        }

        let response = self
            .client
            .post(&self.url)
            .json(&message_builder.build())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {}", error_text);
            }
            anyhow::bail!("Discord message failed with status: {status}");
        }

        info!("Successfully sent Discord message");
        Ok(format!("discord-{}", status.as_u16()))
    }
}
