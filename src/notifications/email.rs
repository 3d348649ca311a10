use crate::error::{AppError, Result};
use crate::models::Notification;
use crate::notifications::NotificationSender;
use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// SMTP email sender
#[derive(Clone)]
pub struct EmailSender {
    pub(crate) smtp_server: String,
    pub(crate) smtp_port: u16,
    pub(crate) smtp_username: Option<String>,
    pub(crate) smtp_password: Option<String>,
    pub(crate) from: Mailbox,
    pub(crate) recipients: Vec<Mailbox>,
    pub(crate) use_tls: bool,
}

impl EmailSender {
    /// Create a new email sender
    pub fn new(
        smtp_server: String,
        smtp_port: u16,
        smtp_username: Option<String>,
        smtp_password: Option<String>,
        from_email: &str,
        recipients: &[String],
        use_tls: bool,
    ) -> Result<Self> {
        if smtp_server.is_empty() {
            return Err(AppError::Configuration(
                "SMTP server cannot be empty".to_string(),
            ));
        }

        let from = from_email
            .parse::<Mailbox>()
            .map_err(|e| AppError::Configuration(format!("Invalid from address: {}", e)))?;

        let recipients = recipients
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>().map_err(|e| {
                    AppError::Configuration(format!("Invalid recipient address '{}': {}", addr, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if recipients.is_empty() {
            return Err(AppError::Configuration("No email recipients configured".to_string()));
        }

        Ok(Self {
            smtp_server,
            smtp_port,
            smtp_username,
            smtp_password,
            from,
            recipients,
            use_tls,
        })
    }

    pub(crate) fn build_message(&self, notification: &Notification) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject())
            .header(header::ContentType::TEXT_PLAIN);

        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        let mut body = notification.render();
        if let Some(url) = &notification.url {
            body.push_str("\n\n");
            body.push_str(url);
        }

        builder
            .body(body)
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn delivery_error(message: impl Into<String>) -> AppError {
        AppError::NotificationDelivery {
            channel: "email".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = self.build_message(notification)?;

        // lettre's SmtpTransport is blocking.
        tokio::task::spawn_blocking({
            let smtp_server = self.smtp_server.clone();
            let smtp_port = self.smtp_port;
            let username = self.smtp_username.clone();
            let password = self.smtp_password.clone();
            let use_tls = self.use_tls;

            move || {
                let mut transport_builder = if use_tls {
                    SmtpTransport::starttls_relay(&smtp_server)
                        .map_err(|e| AppError::Configuration(format!("Invalid SMTP server: {}", e)))?
                } else {
                    SmtpTransport::builder_dangerous(&smtp_server)
                };
                transport_builder = transport_builder.port(smtp_port);

                if let (Some(user), Some(pass)) = (username, password) {
                    transport_builder = transport_builder.credentials(Credentials::new(user, pass));
                }

                transport_builder
                    .build()
                    .send(&message)
                    .map_err(|e| Self::delivery_error(e.to_string()))?;

                Ok::<(), AppError>(())
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
    }
}
