pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ingest::{PollingOrchestrator, WebhookIngestor};
use crate::notifications::NotificationDispatcher;
use crate::processing::IncidentProcessor;
use crate::providers::ProviderRegistry;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<IncidentProcessor>,
    pub webhooks: Arc<WebhookIngestor>,
    pub providers: Arc<ProviderRegistry>,
    pub polling: Arc<PollingOrchestrator>,
    pub notifier: Option<Arc<NotificationDispatcher>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        processor: Arc<IncidentProcessor>,
        providers: Arc<ProviderRegistry>,
        polling: Arc<PollingOrchestrator>,
    ) -> Self {
        Self {
            webhooks: Arc::new(WebhookIngestor::new(processor.clone())),
            processor,
            providers,
            polling,
            notifier: None,
            started_at: Instant::now(),
        }
    }

    /// Expose notification counters on the system health endpoint
    pub fn with_notifier(mut self, notifier: Arc<NotificationDispatcher>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}
