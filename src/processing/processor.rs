use crate::error::Result;
use crate::metrics;
use crate::models::{
    CanonicalEvent, ComponentRecord, ComponentSnapshot, Notification, NotificationKind,
};
use crate::notifications::NotificationDispatcher;
use crate::processing::{Classification, ComponentRegistry, IncidentLifecycle, LifecycleOutcome};
use async_trait::async_trait;
use std::sync::Arc;

/// Where ingestion paths hand their canonical events.
///
/// Webhooks and the polling fallback both feed the same sink, so there is a
/// single place that decides what is new.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn submit(&self, event: CanonicalEvent) -> Result<Classification>;

    async fn submit_component(&self, snapshot: ComponentSnapshot) -> Result<()>;
}

/// Main reconciliation pipeline
pub struct IncidentProcessor {
    lifecycle: Arc<IncidentLifecycle>,
    components: Arc<ComponentRegistry>,
    notifier: Option<Arc<NotificationDispatcher>>,
}

impl IncidentProcessor {
    pub fn new(lifecycle: Arc<IncidentLifecycle>, components: Arc<ComponentRegistry>) -> Self {
        Self {
            lifecycle,
            components,
            notifier: None,
        }
    }

    /// Attach the notification boundary
    pub fn with_notifications(mut self, notifier: Arc<NotificationDispatcher>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn lifecycle(&self) -> &Arc<IncidentLifecycle> {
        &self.lifecycle
    }

    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    /// Reconcile one event and notify on anything actionable
    pub async fn process_event(&self, event: CanonicalEvent) -> Result<LifecycleOutcome> {
        tracing::debug!(
            provider = %event.provider,
            service_id = %event.service_id,
            status = %event.status,
            source = %event.source,
            "Processing status event"
        );

        let outcome = self.lifecycle.apply(&event).await?;
        metrics::record_event(
            &event.provider,
            &event.source.to_string(),
            &outcome.classification.to_string(),
        );

        if let Some(kind) = notification_kind(&outcome) {
            if let Some(notifier) = &self.notifier {
                notifier.dispatch(Notification::from_record(kind, &outcome.record));
            }
        }

        Ok(outcome)
    }

    pub async fn process_component(&self, snapshot: ComponentSnapshot) -> Result<ComponentRecord> {
        self.components.refresh(&snapshot).await
    }
}

/// NEW opens, CHANGED either updates or resolves, DUPLICATE is silent.
///
/// Only the transition into resolved announces a resolution; later edits to
/// an already resolved incident go out as updates.
fn notification_kind(outcome: &LifecycleOutcome) -> Option<NotificationKind> {
    let was_resolved = outcome
        .previous_status
        .map_or(false, |status| status.is_resolved());

    match outcome.classification {
        Classification::New => Some(NotificationKind::New),
        Classification::Changed if outcome.record.status.is_resolved() && !was_resolved => {
            Some(NotificationKind::Resolved)
        }
        Classification::Changed => Some(NotificationKind::Updated),
        Classification::Duplicate => None,
    }
}

#[async_trait]
impl EventSink for IncidentProcessor {
    async fn submit(&self, event: CanonicalEvent) -> Result<Classification> {
        Ok(self.process_event(event).await?.classification)
    }

    async fn submit_component(&self, snapshot: ComponentSnapshot) -> Result<()> {
        self.process_component(snapshot).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentStatus, Severity};
    use crate::notifications::NotificationSender;
    use crate::processing::ChangeDetector;
    use crate::state::{InMemoryStore, StatusCache, StatusStore};
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Recording {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationSender for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, notification: &Notification) -> Result<()> {
            self.seen.lock().push(notification.render());
            Ok(())
        }
    }

    fn processor(seen: Arc<Mutex<Vec<String>>>) -> IncidentProcessor {
        let store: Arc<dyn StatusStore> = Arc::new(InMemoryStore::new());
        let lifecycle = Arc::new(IncidentLifecycle::new(
            store.clone(),
            StatusCache::disabled(),
            ChangeDetector::default(),
            3,
        ));
        let components = Arc::new(ComponentRegistry::new(store, StatusCache::disabled(), 5));
        let dispatcher = NotificationDispatcher::with_senders(
            vec![Arc::new(Recording { seen })],
            16,
            Duration::from_secs(1),
        );
        IncidentProcessor::new(lifecycle, components).with_notifications(Arc::new(dispatcher))
    }

    async fn settle(seen: &Arc<Mutex<Vec<String>>>, expected: usize) {
        for _ in 0..100 {
            if seen.lock().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_notifies_new_and_resolved_but_not_duplicates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor = processor(seen.clone());

        let open = CanonicalEvent::new("openai", "inc-1", "ChatGPT", IncidentStatus::Investigating, Severity::Major, "Errors");
        assert_eq!(processor.submit(open.clone()).await.unwrap(), Classification::New);
        assert_eq!(processor.submit(open).await.unwrap(), Classification::Duplicate);

        let resolved = CanonicalEvent::new("openai", "inc-1", "ChatGPT", IncidentStatus::Resolved, Severity::Major, "Fixed");
        assert_eq!(processor.submit(resolved).await.unwrap(), Classification::Changed);

        settle(&seen, 2).await;
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("Product: ChatGPT"));
        assert_eq!(seen[1], "Incident Resolved: ChatGPT | Resolution: Fixed");
    }

    #[tokio::test]
    async fn test_status_change_is_an_update_notification() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor = processor(seen.clone());

        processor
            .submit(CanonicalEvent::new("openai", "inc-2", "API", IncidentStatus::Investigating, Severity::Minor, "Looking"))
            .await
            .unwrap();
        processor
            .submit(CanonicalEvent::new("openai", "inc-2", "API", IncidentStatus::Identified, Severity::Minor, "Found it"))
            .await
            .unwrap();

        settle(&seen, 2).await;
        assert_eq!(seen.lock()[1], "Status Update for API: Found it");
    }

    #[tokio::test]
    async fn test_edit_after_resolution_is_not_announced_as_resolved_again() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor = processor(seen);
        let lifecycle = processor.lifecycle();
        let t0 = chrono::Utc::now() - chrono::Duration::minutes(10);

        let open = CanonicalEvent::new("openai", "inc-3", "API", IncidentStatus::Investigating, Severity::Major, "Errors");
        let opened = lifecycle.apply_at(&open, t0).await.unwrap();
        assert_eq!(notification_kind(&opened), Some(NotificationKind::New));

        let fixed = CanonicalEvent::new("openai", "inc-3", "API", IncidentStatus::Resolved, Severity::Major, "Fixed");
        let resolved = lifecycle
            .apply_at(&fixed, t0 + chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(notification_kind(&resolved), Some(NotificationKind::Resolved));

        let postmortem = CanonicalEvent::new("openai", "inc-3", "API", IncidentStatus::Resolved, Severity::Major, "Postmortem published");
        let edited = lifecycle
            .apply_at(&postmortem, t0 + chrono::Duration::seconds(91))
            .await
            .unwrap();
        assert_eq!(edited.classification, Classification::Changed);
        assert_eq!(edited.previous_status, Some(IncidentStatus::Resolved));
        assert_eq!(notification_kind(&edited), Some(NotificationKind::Updated));
    }
}
