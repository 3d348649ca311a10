use crate::config::ProviderConfig;
use crate::error::Result;
use crate::models::{CanonicalEvent, ComponentSnapshot};
use crate::processing::EventSink;
use crate::providers::{GenericStatuspageProvider, StatusProvider, SyncReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const PROVIDER_NAME: &str = "openai";
pub const DEFAULT_BASE_URL: &str = "https://status.openai.com/api/v2";
pub const DEFAULT_PAGE_ID: &str = "openai";

/// OpenAI's status page. Always registered under `openai`, whatever name
/// the configuration entry carries.
pub struct OpenAiStatusProvider {
    inner: GenericStatuspageProvider,
}

impl OpenAiStatusProvider {
    pub fn new(base_url: &str, page_id: &str, timeout: Duration) -> Result<Self> {
        let inner = GenericStatuspageProvider::new(
            PROVIDER_NAME,
            base_url,
            page_id,
            Some(format!("/webhook/{}", PROVIDER_NAME)),
            timeout,
        )?;
        Ok(Self { inner })
    }

    pub fn with_defaults(timeout: Duration) -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, DEFAULT_PAGE_ID, timeout)
    }

    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let base_url = if config.base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            &config.base_url
        };
        let page_id = if config.page_id.is_empty() {
            DEFAULT_PAGE_ID
        } else {
            &config.page_id
        };

        let mut provider = Self::new(base_url, page_id, timeout)?;
        provider.inner = provider.inner.with_webhook_secret(config.webhook_secret());
        Ok(provider)
    }
}

#[async_trait]
impl StatusProvider for OpenAiStatusProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn page_id(&self) -> &str {
        self.inner.page_id()
    }

    fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    fn webhook_url(&self) -> Option<&str> {
        self.inner.webhook_url()
    }

    async fn list_incidents(&self) -> Result<Vec<CanonicalEvent>> {
        self.inner.list_incidents().await
    }

    async fn list_components(&self) -> Result<Vec<ComponentSnapshot>> {
        self.inner.list_components().await
    }

    async fn sync(&self, sink: &dyn EventSink) -> Result<SyncReport> {
        self.inner.sync(sink).await
    }

    async fn is_healthy(&self) -> bool {
        self.inner.is_healthy().await
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        self.inner.validate_webhook_signature(payload, signature)
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.inner.last_sync()
    }
}
