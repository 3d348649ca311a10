use crate::error::Result;
use crate::models::Notification;
use async_trait::async_trait;

/// One outbound notification channel
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Channel name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Deliver a single notification
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to stdout and the log; always available
#[derive(Debug, Clone, Default)]
pub struct ConsoleSender;

#[async_trait]
impl NotificationSender for ConsoleSender {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        println!("[{}] {}", notification.provider, notification.render());
        tracing::info!(
            provider = %notification.provider,
            service_id = %notification.service_id,
            kind = %notification.kind,
            "Console notification emitted"
        );
        Ok(())
    }
}
