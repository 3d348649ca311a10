use crate::error::{AppError, Result};
use crate::models::Notification;
use crate::notifications::NotificationSender;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Generic JSON webhook sender
#[derive(Clone)]
pub struct WebhookSender {
    pub(crate) url: String,
    pub(crate) client: Client,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event_type: String,
    timestamp: String,
    summary: String,
    notification: &'a Notification,
}

impl WebhookSender {
    /// Create a new webhook sender
    pub fn new(url: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = WebhookPayload {
            event_type: format!("incident.{}", notification.kind),
            timestamp: notification.created_at.to_rfc3339(),
            summary: notification.render(),
            notification,
        };

        let response = self
            .client
            .post(&self.url)
            .header("X-Notification-Id", notification.id.to_string())
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::NotificationDelivery {
                channel: "webhook".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::NotificationDelivery {
                channel: "webhook".to_string(),
                message: format!("endpoint returned {}", response.status()),
            });
        }
        Ok(())
    }
}
