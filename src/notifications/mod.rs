pub mod email;
pub mod sender;
pub mod service;
pub mod slack;
pub mod telegram;
pub mod webhook;

pub use email::EmailSender;
pub use sender::{ConsoleSender, NotificationSender};
pub use service::{NotificationDispatcher, NotificationStats};
pub use slack::SlackSender;
pub use telegram::TelegramSender;
pub use webhook::WebhookSender;
