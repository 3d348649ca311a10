use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::ingest::mapping;
use crate::metrics;
use crate::models::{CanonicalEvent, ComponentSnapshot, EventSource};
use crate::processing::EventSink;
use crate::providers::{submit_all, verify_signature, StatusProvider, StatuspageClient, SyncReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;

/// Any Statuspage-compatible page, parameterized by base URL and page id
pub struct GenericStatuspageProvider {
    name: String,
    client: StatuspageClient,
    webhook_path: Option<String>,
    webhook_secret: Option<String>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl GenericStatuspageProvider {
    pub fn new(
        name: &str,
        base_url: &str,
        page_id: &str,
        webhook_path: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(AppError::InvalidArgument(
                "Provider name cannot be empty".to_string(),
            ));
        }

        let client = StatuspageClient::new(name.clone(), base_url, page_id, timeout)?;
        let webhook_path = webhook_path.or_else(|| Some(format!("/webhook/{}", name)));

        Ok(Self {
            name,
            client,
            webhook_path,
            webhook_secret: None,
            last_sync: RwLock::new(None),
        })
    }

    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let provider = Self::new(
            &config.name,
            &config.base_url,
            &config.page_id,
            config.webhook_path.clone(),
            timeout,
        )?;
        Ok(provider.with_webhook_secret(config.webhook_secret()))
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret;
        self
    }
}

#[async_trait]
impl StatusProvider for GenericStatuspageProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_id(&self) -> &str {
        self.client.page_id()
    }

    fn base_url(&self) -> &str {
        self.client.base_url()
    }

    fn webhook_url(&self) -> Option<&str> {
        self.webhook_path.as_deref()
    }

    async fn list_incidents(&self) -> Result<Vec<CanonicalEvent>> {
        let incidents = self.client.incidents().await.map_err(|e| {
            metrics::record_provider_error(&self.name, "incidents");
            e
        })?;

        tracing::debug!(provider = %self.name, count = incidents.len(), "Retrieved incidents");

        Ok(incidents
            .iter()
            .map(|incident| mapping::incident_event(&self.name, incident, EventSource::Polling))
            .collect())
    }

    async fn list_components(&self) -> Result<Vec<ComponentSnapshot>> {
        let components = self.client.components().await.map_err(|e| {
            metrics::record_provider_error(&self.name, "components");
            e
        })?;

        tracing::debug!(provider = %self.name, count = components.len(), "Retrieved components");

        Ok(components
            .iter()
            .map(|component| mapping::component_snapshot(&self.name, component))
            .collect())
    }

    async fn sync(&self, sink: &dyn EventSink) -> Result<SyncReport> {
        tracing::info!(provider = %self.name, "Syncing provider status");

        let events = self.list_incidents().await?;
        let report = submit_all(&self.name, events, sink).await;
        *self.last_sync.write() = Some(Utc::now());

        tracing::info!(
            provider = %self.name,
            fetched = report.fetched,
            new = report.new,
            changed = report.changed,
            failed = report.failed,
            "Provider sync completed"
        );

        Ok(report)
    }

    async fn is_healthy(&self) -> bool {
        let healthy = match self.client.status().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(provider = %self.name, error = %e, "Provider health check failed");
                metrics::record_provider_error(&self.name, "status");
                false
            }
        };
        metrics::set_provider_health(&self.name, healthy);
        healthy
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        verify_signature(self.webhook_secret.as_deref(), payload, signature)
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncidentStatus;

    #[test]
    fn test_empty_name_rejected() {
        let err = GenericStatuspageProvider::new("  ", "http://localhost", "p", None, Duration::from_secs(1));
        assert!(matches!(err, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_default_webhook_path() {
        let provider = GenericStatuspageProvider::new("Acme", "http://localhost", "p", None, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.name(), "acme");
        assert_eq!(provider.webhook_url(), Some("/webhook/acme"));
        assert!(provider.last_sync().is_none());
    }

    #[tokio::test]
    async fn test_list_incidents_maps_with_shared_rules() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pages/p1/incidents.json")
            .with_status(200)
            .with_body(r#"{"incidents":[{"id":"i1","name":"Outage","status":"resolved","impact":"critical","incident_updates":[]}]}"#)
            .create_async()
            .await;

        let provider = GenericStatuspageProvider::new("acme", &server.url(), "p1", None, Duration::from_secs(5)).unwrap();
        let events = provider.list_incidents().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, IncidentStatus::Resolved);
        assert_eq!(events[0].message, "");
        assert_eq!(events[0].source, EventSource::Polling);
    }

    #[tokio::test]
    async fn test_health_follows_status_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/pages/up/status.json")
            .with_status(200)
            .with_body(r#"{"status":{"indicator":"none","description":"All Systems Operational"}}"#)
            .create_async()
            .await;
        let _down = server
            .mock("GET", "/pages/down/status.json")
            .with_status(500)
            .create_async()
            .await;

        let up = GenericStatuspageProvider::new("up", &server.url(), "up", None, Duration::from_secs(5)).unwrap();
        let down = GenericStatuspageProvider::new("down", &server.url(), "down", None, Duration::from_secs(5)).unwrap();

        assert!(up.is_healthy().await);
        assert!(!down.is_healthy().await);
    }
}
