use crate::error::{AppError, Result};
use crate::models::{ComponentRecord, ComponentStatus, IncidentKey, IncidentRecord, StatusChangeRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Durable storage for incidents, their audit trail and the component registry.
///
/// Uniqueness of `(provider, service_id)` and of `(provider, component_id)` is
/// enforced here, not by callers. Racing writers observe
/// [`AppError::PersistenceConflict`] and are expected to re-read and retry.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Get the incident tracked under `key`
    async fn find_incident(&self, key: &IncidentKey) -> Result<Option<IncidentRecord>>;

    /// Insert a new incident; conflicts when the key is already present
    async fn insert_incident(&self, record: &IncidentRecord) -> Result<()>;

    /// Replace the incident if it is still at `expected_revision`, and append
    /// the audit row in the same unit of work
    async fn commit_transition(
        &self,
        record: &IncidentRecord,
        expected_revision: u64,
        change: &StatusChangeRecord,
    ) -> Result<()>;

    /// Non-resolved incidents, most recently updated first
    async fn list_active(&self) -> Result<Vec<IncidentRecord>>;

    /// Incidents of `provider` updated at or after `since`, newest first
    async fn list_updated_since(
        &self,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<IncidentRecord>>;

    async fn count_incidents(&self) -> Result<u64>;

    /// Audit rows of one incident at or after `since`, oldest first
    async fn status_changes(
        &self,
        service_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusChangeRecord>>;

    /// Audit rows of one provider, newest first
    async fn status_changes_for_provider(&self, provider: &str) -> Result<Vec<StatusChangeRecord>>;

    async fn find_component(
        &self,
        provider: &str,
        component_id: &str,
    ) -> Result<Option<ComponentRecord>>;

    /// Insert a new component; conflicts when already registered
    async fn insert_component(&self, record: &ComponentRecord) -> Result<()>;

    /// Replace the component if it is still at `expected_version`
    async fn update_component(&self, record: &ComponentRecord, expected_version: u64) -> Result<()>;

    /// Components of `provider` ordered by position
    async fn list_components(&self, provider: &str) -> Result<Vec<ComponentRecord>>;

    /// Degraded components across providers, most recently updated first
    async fn list_degraded_components(&self) -> Result<Vec<ComponentRecord>>;

    /// Drop operational components not checked since `cutoff`
    async fn delete_stale_components(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Cheap liveness probe of the backend
    async fn health_check(&self) -> Result<()>;
}

pub(crate) fn sort_by_recency(records: &mut [IncidentRecord]) {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

pub(crate) fn sort_by_position(components: &mut [ComponentRecord]) {
    components.sort_by(|a, b| match (a.position, b.position) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });
}

pub(crate) fn is_stale(component: &ComponentRecord, cutoff: DateTime<Utc>) -> bool {
    component.current_status == ComponentStatus::Operational && component.last_checked_at < cutoff
}

pub(crate) fn incident_conflict(key: &IncidentKey) -> AppError {
    AppError::PersistenceConflict(format!("incident {} already exists", key))
}

pub(crate) fn revision_conflict(key: &IncidentKey, expected: u64) -> AppError {
    AppError::PersistenceConflict(format!(
        "incident {} is no longer at revision {}",
        key, expected
    ))
}

pub(crate) fn component_conflict(provider: &str, component_id: &str) -> AppError {
    AppError::PersistenceConflict(format!("component {}/{} changed concurrently", provider, component_id))
}

/// In-memory status store (for development and testing)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    incidents: Arc<DashMap<IncidentKey, IncidentRecord>>,
    changes: Arc<RwLock<Vec<StatusChangeRecord>>>,
    components: Arc<DashMap<(String, String), ComponentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for InMemoryStore {
    async fn find_incident(&self, key: &IncidentKey) -> Result<Option<IncidentRecord>> {
        Ok(self.incidents.get(key).map(|entry| entry.clone()))
    }

    async fn insert_incident(&self, record: &IncidentRecord) -> Result<()> {
        match self.incidents.entry(record.key()) {
            Entry::Occupied(entry) => Err(incident_conflict(entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                tracing::debug!(provider = %record.provider, service_id = %record.service_id, "Incident inserted");
                Ok(())
            }
        }
    }

    async fn commit_transition(
        &self,
        record: &IncidentRecord,
        expected_revision: u64,
        change: &StatusChangeRecord,
    ) -> Result<()> {
        let key = record.key();
        let mut current = self
            .incidents
            .get_mut(&key)
            .ok_or_else(|| revision_conflict(&key, expected_revision))?;

        if current.revision != expected_revision {
            return Err(revision_conflict(&key, expected_revision));
        }

        *current = record.clone();
        // Audit append happens under the same shard lock.
        self.changes.write().push(change.clone());
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<IncidentRecord>> {
        let mut active: Vec<IncidentRecord> = self
            .incidents
            .iter()
            .filter(|entry| entry.is_active())
            .map(|entry| entry.clone())
            .collect();
        sort_by_recency(&mut active);
        Ok(active)
    }

    async fn list_updated_since(
        &self,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<IncidentRecord>> {
        let mut recent: Vec<IncidentRecord> = self
            .incidents
            .iter()
            .filter(|entry| entry.provider == provider && entry.updated_at >= since)
            .map(|entry| entry.clone())
            .collect();
        sort_by_recency(&mut recent);
        Ok(recent)
    }

    async fn count_incidents(&self) -> Result<u64> {
        Ok(self.incidents.len() as u64)
    }

    async fn status_changes(
        &self,
        service_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusChangeRecord>> {
        let mut rows: Vec<StatusChangeRecord> = self
            .changes
            .read()
            .iter()
            .filter(|c| c.service_id == service_id && c.changed_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.changed_at.cmp(&b.changed_at));
        Ok(rows)
    }

    async fn status_changes_for_provider(&self, provider: &str) -> Result<Vec<StatusChangeRecord>> {
        let mut rows: Vec<StatusChangeRecord> = self
            .changes
            .read()
            .iter()
            .filter(|c| c.provider == provider)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(rows)
    }

    async fn find_component(
        &self,
        provider: &str,
        component_id: &str,
    ) -> Result<Option<ComponentRecord>> {
        Ok(self
            .components
            .get(&(provider.to_string(), component_id.to_string()))
            .map(|entry| entry.clone()))
    }

    async fn insert_component(&self, record: &ComponentRecord) -> Result<()> {
        match self
            .components
            .entry((record.provider.clone(), record.component_id.clone()))
        {
            Entry::Occupied(_) => Err(component_conflict(&record.provider, &record.component_id)),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update_component(&self, record: &ComponentRecord, expected_version: u64) -> Result<()> {
        let key = (record.provider.clone(), record.component_id.clone());
        let mut current = self
            .components
            .get_mut(&key)
            .ok_or_else(|| component_conflict(&record.provider, &record.component_id))?;
        if current.version != expected_version {
            return Err(component_conflict(&record.provider, &record.component_id));
        }
        *current = record.clone();
        Ok(())
    }

    async fn list_components(&self, provider: &str) -> Result<Vec<ComponentRecord>> {
        let mut components: Vec<ComponentRecord> = self
            .components
            .iter()
            .filter(|entry| entry.provider == provider)
            .map(|entry| entry.clone())
            .collect();
        sort_by_position(&mut components);
        Ok(components)
    }

    async fn list_degraded_components(&self) -> Result<Vec<ComponentRecord>> {
        let mut degraded: Vec<ComponentRecord> = self
            .components
            .iter()
            .filter(|entry| entry.current_status.is_degraded())
            .map(|entry| entry.clone())
            .collect();
        degraded.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(degraded)
    }

    async fn delete_stale_components(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let before = self.components.len();
        self.components.retain(|_, component| !is_stale(component, cutoff));
        Ok(before.saturating_sub(self.components.len()))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
