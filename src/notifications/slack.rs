use crate::error::{AppError, Result};
use crate::models::{Notification, NotificationKind, Severity};
use crate::notifications::NotificationSender;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Slack incoming-webhook sender
#[derive(Clone)]
pub struct SlackSender {
    pub(crate) webhook_url: String,
    pub(crate) client: Client,
}

#[derive(Debug, Serialize)]
struct SlackWebhookPayload {
    text: String,
    blocks: Vec<SlackBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum SlackBlock {
    #[serde(rename = "header")]
    Header { text: SlackText },
    #[serde(rename = "section")]
    Section { text: SlackText },
    #[serde(rename = "context")]
    Context { elements: Vec<SlackText> },
}

#[derive(Debug, Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    text_type: String,
    text: String,
}

impl SlackText {
    fn plain(text: String) -> Self {
        Self {
            text_type: "plain_text".to_string(),
            text,
        }
    }

    fn mrkdwn(text: String) -> Self {
        Self {
            text_type: "mrkdwn".to_string(),
            text,
        }
    }
}

impl SlackSender {
    /// Create a new Slack sender
    pub fn new(webhook_url: String, timeout_secs: u64) -> Result<Self> {
        if webhook_url.is_empty() {
            return Err(AppError::Configuration(
                "Slack webhook URL cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { webhook_url, client })
    }

    fn build_payload(&self, notification: &Notification) -> SlackWebhookPayload {
        let emoji = match (notification.kind, notification.severity) {
            (NotificationKind::Resolved, _) => "✅",
            (_, Severity::Critical) => "🔴",
            (_, Severity::Major) => "🟠",
            (_, Severity::Minor) => "🟡",
            (_, Severity::Maintenance) => "🔧",
            _ => "ℹ️",
        };

        let mut context = vec![SlackText::mrkdwn(format!(
            "Provider: `{}` | Status: *{}* | Severity: *{}*",
            notification.provider, notification.status, notification.severity
        ))];
        if let Some(url) = &notification.url {
            context.push(SlackText::mrkdwn(format!("<{}|View on status page>", url)));
        }

        SlackWebhookPayload {
            text: notification.render(),
            blocks: vec![
                SlackBlock::Header {
                    text: SlackText::plain(format!("{} {}", emoji, notification.service_name)),
                },
                SlackBlock::Section {
                    text: SlackText::mrkdwn(notification.render()),
                },
                SlackBlock::Context { elements: context },
            ],
        }
    }
}

#[async_trait]
impl NotificationSender for SlackSender {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = self.build_payload(notification);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::NotificationDelivery {
                channel: "slack".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotificationDelivery {
                channel: "slack".to_string(),
                message: format!("webhook returned {}: {}", status, body),
            });
        }

        Ok(())
    }
}
