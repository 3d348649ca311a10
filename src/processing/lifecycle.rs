use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    CanonicalEvent, IncidentKey, IncidentRecord, IncidentStatus, StatusChangeRecord,
};
use crate::processing::{ChangeDetector, Classification};
use crate::state::{StatusCache, StatusStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Result of applying one event to persisted state
#[derive(Debug, Clone)]
pub struct LifecycleOutcome {
    pub classification: Classification,
    /// Record as it stands after the event was applied
    pub record: IncidentRecord,
    /// Status before a CHANGED transition
    pub previous_status: Option<IncidentStatus>,
}

/// Owns incident records and the audit trail.
///
/// Every mutation goes through the store's uniqueness and revision checks.
/// A lost race (insert against an existing key, or a transition against a
/// moved revision) re-reads and re-classifies, so a create race turns into
/// an update and a concurrent duplicate becomes a no-op.
pub struct IncidentLifecycle {
    store: Arc<dyn StatusStore>,
    cache: StatusCache,
    detector: ChangeDetector,
    max_attempts: u32,
}

impl IncidentLifecycle {
    pub fn new(
        store: Arc<dyn StatusStore>,
        cache: StatusCache,
        detector: ChangeDetector,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            cache,
            detector,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Apply an event using the wall clock
    pub async fn apply(&self, event: &CanonicalEvent) -> Result<LifecycleOutcome> {
        self.apply_at(event, Utc::now()).await
    }

    /// Apply an event as of `now`
    pub async fn apply_at(
        &self,
        event: &CanonicalEvent,
        now: DateTime<Utc>,
    ) -> Result<LifecycleOutcome> {
        let key = event.key();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let existing = self.store.find_incident(&key).await?;
            let classification = self.detector.classify(event, existing.as_ref(), now);

            let result = match (classification, existing) {
                (Classification::New, _) => self.create(event, now).await,
                (Classification::Changed, Some(current)) => {
                    self.transition(event, current, now).await
                }
                (Classification::Duplicate, Some(current)) => {
                    tracing::debug!(
                        incident = %key,
                        status = %event.status,
                        "Duplicate event suppressed"
                    );
                    return Ok(LifecycleOutcome {
                        classification,
                        record: current,
                        previous_status: None,
                    });
                }
                (verdict, None) => {
                    return Err(AppError::Internal(format!(
                        "{} verdict for {} without a stored record",
                        verdict, key
                    )))
                }
            };

            match result {
                Ok(outcome) => {
                    self.cache.put_incident(&outcome.record).await;
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    metrics::PERSISTENCE_CONFLICTS_TOTAL.inc();
                    tracing::warn!(
                        incident = %key,
                        attempt = attempt,
                        error = %e,
                        "Store conflict, re-reading and re-classifying"
                    );
                }
                Err(e) => {
                    if e.is_conflict() {
                        metrics::PERSISTENCE_CONFLICTS_TOTAL.inc();
                        self.cache.invalidate_incident(&key).await;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn create(&self, event: &CanonicalEvent, now: DateTime<Utc>) -> Result<LifecycleOutcome> {
        let record = IncidentRecord::from_event(event, now);
        self.store.insert_incident(&record).await?;

        tracing::info!(
            provider = %record.provider,
            service_id = %record.service_id,
            status = %record.status,
            severity = %record.severity,
            "New incident recorded"
        );

        Ok(LifecycleOutcome {
            classification: Classification::New,
            record,
            previous_status: None,
        })
    }

    async fn transition(
        &self,
        event: &CanonicalEvent,
        current: IncidentRecord,
        now: DateTime<Utc>,
    ) -> Result<LifecycleOutcome> {
        let next = current.transitioned(event, now);
        let change = StatusChangeRecord::new(
            &current,
            next.status,
            Some(format!("{} event", event.source)),
            now,
        );
        self.store
            .commit_transition(&next, current.revision, &change)
            .await?;

        if current.status.is_resolved() && !next.status.is_resolved() {
            tracing::info!(
                provider = %next.provider,
                service_id = %next.service_id,
                status = %next.status,
                "Resolved incident reopened"
            );
        } else {
            tracing::info!(
                provider = %next.provider,
                service_id = %next.service_id,
                from = %current.status,
                to = %next.status,
                "Incident status changed"
            );
        }

        Ok(LifecycleOutcome {
            classification: Classification::Changed,
            record: next,
            previous_status: Some(current.status),
        })
    }

    /// Non-resolved incidents, most recently updated first
    pub async fn active_incidents(&self) -> Result<Vec<IncidentRecord>> {
        self.store.list_active().await
    }

    /// Incidents of `provider` updated within the trailing window
    pub async fn recent_incidents(&self, provider: &str, hours: i64) -> Result<Vec<IncidentRecord>> {
        let since = Utc::now() - Duration::hours(hours);
        self.store
            .list_updated_since(&provider.to_ascii_lowercase(), since)
            .await
    }

    /// Single incident lookup, read through the cache
    pub async fn incident(&self, key: &IncidentKey) -> Result<IncidentRecord> {
        if let Some(record) = self.cache.get_incident(key).await {
            return Ok(record);
        }
        let record = self
            .store
            .find_incident(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("incident {}", key)))?;
        self.cache.put_incident(&record).await;
        Ok(record)
    }

    /// Audit trail of one incident within the trailing window, oldest first
    pub async fn status_history(&self, service_id: &str, hours: i64) -> Result<Vec<StatusChangeRecord>> {
        let since = Utc::now() - Duration::hours(hours);
        self.store.status_changes(service_id, since).await
    }

    /// Audit trail of a provider, newest first
    pub async fn provider_history(&self, provider: &str) -> Result<Vec<StatusChangeRecord>> {
        self.store
            .status_changes_for_provider(&provider.to_ascii_lowercase())
            .await
    }
}
