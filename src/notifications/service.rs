use crate::config::NotificationConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::Notification;
use crate::notifications::{
    ConsoleSender, EmailSender, NotificationSender, SlackSender, TelegramSender, WebhookSender,
};
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Delivery counters
#[derive(Debug, Default)]
struct DispatchCounters {
    queued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct NotificationStats {
    pub queued: u64,
    pub dropped: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Fire-and-forget notification boundary.
///
/// `dispatch` never blocks and never fails the caller: notifications go onto
/// a bounded queue drained by a worker task that fans out to every channel.
/// A slow or failing channel does not delay the others.
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
    senders: Arc<Vec<Arc<dyn NotificationSender>>>,
    counters: Arc<DispatchCounters>,
}

impl NotificationDispatcher {
    /// Build the channel set from configuration and start the worker
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let mut senders: Vec<Arc<dyn NotificationSender>> = Vec::new();

        if config.console_enabled {
            senders.push(Arc::new(ConsoleSender));
        }

        if config.slack_enabled {
            match env_value(&config.slack_webhook_env) {
                Some(url) => senders.push(Arc::new(SlackSender::new(url, config.timeout_secs)?)),
                None => warn!("Slack notifications enabled but no webhook URL configured"),
            }
        }

        if config.telegram_enabled {
            match (env_value(&config.telegram_token_env), config.telegram_chat_id.clone()) {
                (Some(token), Some(chat_id)) => senders.push(Arc::new(TelegramSender::new(
                    config.telegram_api_url.clone(),
                    token,
                    chat_id,
                    config.timeout_secs,
                )?)),
                _ => warn!("Telegram notifications enabled but bot token or chat id missing"),
            }
        }

        if config.email_enabled {
            match (config.smtp_server.as_ref(), config.email_from.as_ref()) {
                (Some(server), Some(from)) => senders.push(Arc::new(EmailSender::new(
                    server.clone(),
                    config.smtp_port,
                    env_value(&config.smtp_username_env),
                    env_value(&config.smtp_password_env),
                    from,
                    &config.email_to,
                    config.smtp_use_tls,
                )?)),
                _ => warn!("Email notifications enabled but SMTP server or from address not configured"),
            }
        }

        if config.webhook_enabled {
            match config.webhook_url.clone() {
                Some(url) => senders.push(Arc::new(WebhookSender::new(url, config.timeout_secs)?)),
                None => warn!("Webhook notifications enabled but no URL configured"),
            }
        }

        let dispatcher = Self::with_senders(
            senders,
            config.queue_size,
            Duration::from_secs(config.timeout_secs),
        );

        info!(
            channels = ?dispatcher.channel_names(),
            queue_size = config.queue_size,
            "Notification dispatcher initialized"
        );

        Ok(dispatcher)
    }

    /// Start a dispatcher over an explicit channel set
    pub fn with_senders(
        senders: Vec<Arc<dyn NotificationSender>>,
        queue_size: usize,
        send_timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let senders = Arc::new(senders);
        let counters = Arc::new(DispatchCounters::default());

        Self::spawn_worker(rx, senders.clone(), counters.clone(), send_timeout);

        Self {
            tx,
            senders,
            counters,
        }
    }

    /// Hand a notification to the queue without waiting for delivery
    pub fn dispatch(&self, notification: Notification) {
        if notification.is_critical() {
            warn!(
                provider = %notification.provider,
                service_id = %notification.service_id,
                "CRITICAL: {}",
                notification.render()
            );
        }

        match self.tx.try_send(notification) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                error!(
                    provider = %dropped.provider,
                    service_id = %dropped.service_id,
                    "Notification queue full, dropping notification"
                );
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                error!(
                    provider = %dropped.provider,
                    service_id = %dropped.service_id,
                    "Notification worker stopped, dropping notification"
                );
            }
        }
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.senders.iter().map(|s| s.name()).collect()
    }

    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    fn spawn_worker(
        mut rx: mpsc::Receiver<Notification>,
        senders: Arc<Vec<Arc<dyn NotificationSender>>>,
        counters: Arc<DispatchCounters>,
        send_timeout: Duration,
    ) {
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let deliveries = senders.iter().map(|sender| {
                    let notification = &notification;
                    let counters = &counters;
                    async move {
                        let outcome = tokio::time::timeout(send_timeout, sender.send(notification)).await;
                        let result = match outcome {
                            Ok(result) => result,
                            Err(_) => Err(crate::error::AppError::NotificationDelivery {
                                channel: sender.name().to_string(),
                                message: format!("timed out after {:?}", send_timeout),
                            }),
                        };

                        match result {
                            Ok(()) => {
                                counters.sent.fetch_add(1, Ordering::Relaxed);
                                metrics::record_notification(sender.name(), true);
                            }
                            Err(e) => {
                                counters.failed.fetch_add(1, Ordering::Relaxed);
                                metrics::record_notification(sender.name(), false);
                                error!(
                                    channel = sender.name(),
                                    notification_id = %notification.id,
                                    service_id = %notification.service_id,
                                    error = %e,
                                    "Notification delivery failed"
                                );
                            }
                        }
                    }
                });
                join_all(deliveries).await;
            }
            info!("Notification worker stopped");
        });
    }
}

fn env_value(var: &Option<String>) -> Option<String> {
    var.as_ref()
        .and_then(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
}
