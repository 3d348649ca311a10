//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use status_tracker::error::Result;
use status_tracker::models::{
    CanonicalEvent, ComponentRecord, IncidentKey, IncidentRecord, IncidentStatus, Notification,
    NotificationKind, Severity, StatusChangeRecord,
};
use status_tracker::notifications::{NotificationDispatcher, NotificationSender};
use status_tracker::processing::{
    ChangeDetector, ComponentRegistry, IncidentLifecycle, IncidentProcessor,
};
use status_tracker::state::{InMemoryStore, StatusCache, StatusStore};
use std::sync::Arc;
use std::time::Duration;

/// Captures every delivered notification
#[derive(Clone, Default)]
pub struct RecordingSender {
    pub delivered: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl NotificationSender for RecordingSender {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        self.delivered.lock().push(notification.clone());
        Ok(())
    }
}

impl RecordingSender {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.delivered.lock().iter().map(|n| n.kind).collect()
    }

    /// Wait for the dispatcher worker to deliver at least `expected`
    pub async fn settle(&self, expected: usize) {
        for _ in 0..200 {
            if self.delivered.lock().len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // give a stray extra notification the chance to show up
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Fully wired pipeline over an in-memory store
pub struct Pipeline {
    pub store: Arc<dyn StatusStore>,
    pub lifecycle: Arc<IncidentLifecycle>,
    pub components: Arc<ComponentRegistry>,
    pub processor: Arc<IncidentProcessor>,
    pub sender: RecordingSender,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn StatusStore>) -> Self {
        let lifecycle = Arc::new(IncidentLifecycle::new(
            store.clone(),
            StatusCache::disabled(),
            ChangeDetector::default(),
            3,
        ));
        let components = Arc::new(ComponentRegistry::new(
            store.clone(),
            StatusCache::disabled(),
            5,
        ));

        let sender = RecordingSender::default();
        let dispatcher = NotificationDispatcher::with_senders(
            vec![Arc::new(sender.clone())],
            64,
            Duration::from_secs(1),
        );
        let processor = Arc::new(
            IncidentProcessor::new(lifecycle.clone(), components.clone())
                .with_notifications(Arc::new(dispatcher)),
        );

        Self {
            store,
            lifecycle,
            components,
            processor,
            sender,
        }
    }

    pub async fn record(&self, provider: &str, service_id: &str) -> Option<IncidentRecord> {
        self.store
            .find_incident(&IncidentKey::new(provider, service_id))
            .await
            .unwrap()
    }

    pub async fn audit(&self, provider: &str) -> Vec<StatusChangeRecord> {
        let mut rows = self.store.status_changes_for_provider(provider).await.unwrap();
        rows.reverse();
        rows
    }
}

pub fn event(service_id: &str, status: IncidentStatus, message: &str) -> CanonicalEvent {
    CanonicalEvent::new("openai", service_id, "ChatGPT", status, Severity::Major, message)
}

/// Store whose first insert loses a race against a concurrent writer
pub struct RacingStore {
    inner: InMemoryStore,
    racer: Mutex<Option<IncidentRecord>>,
}

impl RacingStore {
    pub fn new(racer: IncidentRecord) -> Self {
        Self {
            inner: InMemoryStore::new(),
            racer: Mutex::new(Some(racer)),
        }
    }
}

#[async_trait]
impl StatusStore for RacingStore {
    async fn find_incident(&self, key: &IncidentKey) -> Result<Option<IncidentRecord>> {
        self.inner.find_incident(key).await
    }

    async fn insert_incident(&self, record: &IncidentRecord) -> Result<()> {
        let racer = self.racer.lock().take();
        if let Some(racer) = racer {
            self.inner.insert_incident(&racer).await?;
        }
        self.inner.insert_incident(record).await
    }

    async fn commit_transition(
        &self,
        record: &IncidentRecord,
        expected_revision: u64,
        change: &StatusChangeRecord,
    ) -> Result<()> {
        self.inner
            .commit_transition(record, expected_revision, change)
            .await
    }

    async fn list_active(&self) -> Result<Vec<IncidentRecord>> {
        self.inner.list_active().await
    }

    async fn list_updated_since(
        &self,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<IncidentRecord>> {
        self.inner.list_updated_since(provider, since).await
    }

    async fn count_incidents(&self) -> Result<u64> {
        self.inner.count_incidents().await
    }

    async fn status_changes(
        &self,
        service_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusChangeRecord>> {
        self.inner.status_changes(service_id, since).await
    }

    async fn status_changes_for_provider(&self, provider: &str) -> Result<Vec<StatusChangeRecord>> {
        self.inner.status_changes_for_provider(provider).await
    }

    async fn find_component(
        &self,
        provider: &str,
        component_id: &str,
    ) -> Result<Option<ComponentRecord>> {
        self.inner.find_component(provider, component_id).await
    }

    async fn insert_component(&self, record: &ComponentRecord) -> Result<()> {
        self.inner.insert_component(record).await
    }

    async fn update_component(&self, record: &ComponentRecord, expected_version: u64) -> Result<()> {
        self.inner.update_component(record, expected_version).await
    }

    async fn list_components(&self, provider: &str) -> Result<Vec<ComponentRecord>> {
        self.inner.list_components(provider).await
    }

    async fn list_degraded_components(&self) -> Result<Vec<ComponentRecord>> {
        self.inner.list_degraded_components().await
    }

    async fn delete_stale_components(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.inner.delete_stale_components(cutoff).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

/// Statuspage incident body as the provider sends it
pub fn incident_json(id: &str, status: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": "Elevated error rates",
        "status": status,
        "impact": "major",
        "shortlink": format!("https://stspg.io/{}", id),
        "incident_updates": [{ "body": body, "status": status }],
        "components": [{ "id": "cmp_api", "name": "API" }]
    })
}
