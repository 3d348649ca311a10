use crate::error::{AppError, Result};
use crate::models::Notification;
use crate::notifications::NotificationSender;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram bot sender (`sendMessage`)
#[derive(Clone)]
pub struct TelegramSender {
    api_url: String,
    bot_token: String,
    chat_id: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramSender {
    pub fn new(
        api_url: String,
        bot_token: String,
        chat_id: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        if bot_token.is_empty() || chat_id.is_empty() {
            return Err(AppError::Configuration(
                "Telegram requires a bot token and a chat id".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }

    fn delivery_error(message: impl Into<String>) -> AppError {
        AppError::NotificationDelivery {
            channel: "telegram".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let mut text = notification.render();
        if let Some(url) = &notification.url {
            text.push('\n');
            text.push_str(url);
        }

        let response = self
            .client
            .post(self.endpoint())
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await
            // The token is part of the URL; keep it out of error messages.
            .map_err(|e| Self::delivery_error(e.without_url().to_string()))?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| Self::delivery_error(format!("unreadable response ({}): {}", status, e.without_url())))?;

        if !body.ok {
            return Err(Self::delivery_error(
                body.description.unwrap_or_else(|| format!("api returned {}", status)),
            ));
        }
        Ok(())
    }
}
