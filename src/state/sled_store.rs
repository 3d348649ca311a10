use crate::error::{AppError, Result};
use crate::models::{ComponentRecord, IncidentKey, IncidentRecord, StatusChangeRecord};
use crate::state::store::{
    component_conflict, incident_conflict, is_stale, revision_conflict, sort_by_position,
    sort_by_recency,
};
use crate::state::StatusStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional};
use std::path::Path;
use std::sync::Arc;

/// Persistent status store using Sled embedded database.
///
/// Inserts go through `compare_and_swap` against an absent key, transitions
/// run as a multi-tree transaction so the record and its audit row land
/// together.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    incidents_tree: sled::Tree,
    changes_tree: sled::Tree,
    components_tree: sled::Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(&path).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let incidents_tree = db.open_tree("incident_logs")?;
        let changes_tree = db.open_tree("status_change_logs")?;
        let components_tree = db.open_tree("component_registry")?;

        tracing::info!("Initialized Sled store at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            incidents_tree,
            changes_tree,
            components_tree,
        })
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn incident_key(key: &IncidentKey) -> Vec<u8> {
        format!("{}\u{0}{}", key.provider, key.service_id).into_bytes()
    }

    /// `service_id \0 changed_at(µs, zero-padded) \0 id`, so a prefix scan is chronological
    fn change_key(change: &StatusChangeRecord) -> Vec<u8> {
        format!(
            "{}\u{0}{:020}\u{0}{}",
            change.service_id,
            change.changed_at.timestamp_micros().max(0),
            change.id
        )
        .into_bytes()
    }

    fn component_key(provider: &str, component_id: &str) -> Vec<u8> {
        format!("{}\u{0}{}", provider, component_id).into_bytes()
    }

    fn scan_incidents(&self) -> Result<Vec<IncidentRecord>> {
        self.incidents_tree
            .iter()
            .values()
            .map(|value| Self::decode::<IncidentRecord>(&value?))
            .collect()
    }

    fn scan_changes(&self, prefix: Option<&str>) -> Result<Vec<StatusChangeRecord>> {
        let iter = match prefix {
            Some(service_id) => self
                .changes_tree
                .scan_prefix(format!("{}\u{0}", service_id).into_bytes()),
            None => self.changes_tree.iter(),
        };
        iter.values()
            .map(|value| Self::decode::<StatusChangeRecord>(&value?))
            .collect()
    }

    fn scan_components(&self) -> Result<Vec<ComponentRecord>> {
        self.components_tree
            .iter()
            .values()
            .map(|value| Self::decode::<ComponentRecord>(&value?))
            .collect()
    }
}

#[async_trait]
impl StatusStore for SledStore {
    async fn find_incident(&self, key: &IncidentKey) -> Result<Option<IncidentRecord>> {
        match self.incidents_tree.get(Self::incident_key(key))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert_incident(&self, record: &IncidentRecord) -> Result<()> {
        let key = record.key();
        let bytes = Self::encode(record)?;
        let swapped = self.incidents_tree.compare_and_swap(
            Self::incident_key(&key),
            None as Option<&[u8]>,
            Some(bytes),
        )?;
        if swapped.is_err() {
            return Err(incident_conflict(&key));
        }
        self.incidents_tree.flush_async().await?;
        tracing::debug!(incident = %key, "Incident inserted");
        Ok(())
    }

    async fn commit_transition(
        &self,
        record: &IncidentRecord,
        expected_revision: u64,
        change: &StatusChangeRecord,
    ) -> Result<()> {
        let key = record.key();
        let record_key = Self::incident_key(&key);
        let record_bytes = Self::encode(record)?;
        let change_key = Self::change_key(change);
        let change_bytes = Self::encode(change)?;

        let outcome = (&self.incidents_tree, &self.changes_tree).transaction(|(incidents, changes)| {
            let current = match incidents.get(&record_key)? {
                Some(bytes) => bytes,
                None => {
                    return Err(ConflictableTransactionError::Abort(revision_conflict(
                        &key,
                        expected_revision,
                    )))
                }
            };
            let current: IncidentRecord = bincode::deserialize(&current)
                .map_err(|e| ConflictableTransactionError::Abort(AppError::from(e)))?;
            if current.revision != expected_revision {
                return Err(ConflictableTransactionError::Abort(revision_conflict(
                    &key,
                    expected_revision,
                )));
            }

            incidents.insert(record_key.clone(), record_bytes.clone())?;
            changes.insert(change_key.clone(), change_bytes.clone())?;
            Ok(())
        });

        match outcome {
            Ok(()) => {
                self.db.flush_async().await?;
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    async fn list_active(&self) -> Result<Vec<IncidentRecord>> {
        let mut active: Vec<IncidentRecord> = self
            .scan_incidents()?
            .into_iter()
            .filter(IncidentRecord::is_active)
            .collect();
        sort_by_recency(&mut active);
        Ok(active)
    }

    async fn list_updated_since(
        &self,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<IncidentRecord>> {
        let prefix = format!("{}\u{0}", provider).into_bytes();
        let mut recent = self
            .incidents_tree
            .scan_prefix(prefix)
            .values()
            .map(|value| Self::decode::<IncidentRecord>(&value?))
            .collect::<Result<Vec<_>>>()?;
        recent.retain(|record| record.updated_at >= since);
        sort_by_recency(&mut recent);
        Ok(recent)
    }

    async fn count_incidents(&self) -> Result<u64> {
        Ok(self.incidents_tree.len() as u64)
    }

    async fn status_changes(
        &self,
        service_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusChangeRecord>> {
        let mut rows = self.scan_changes(Some(service_id))?;
        // Prefix scans can include ids that merely start with `service_id\0`.
        rows.retain(|c| c.service_id == service_id && c.changed_at >= since);
        Ok(rows)
    }

    async fn status_changes_for_provider(&self, provider: &str) -> Result<Vec<StatusChangeRecord>> {
        let mut rows = self.scan_changes(None)?;
        rows.retain(|c| c.provider == provider);
        rows.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(rows)
    }

    async fn find_component(
        &self,
        provider: &str,
        component_id: &str,
    ) -> Result<Option<ComponentRecord>> {
        match self
            .components_tree
            .get(Self::component_key(provider, component_id))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert_component(&self, record: &ComponentRecord) -> Result<()> {
        let swapped = self.components_tree.compare_and_swap(
            Self::component_key(&record.provider, &record.component_id),
            None as Option<&[u8]>,
            Some(Self::encode(record)?),
        )?;
        if swapped.is_err() {
            return Err(component_conflict(&record.provider, &record.component_id));
        }
        Ok(())
    }

    async fn update_component(&self, record: &ComponentRecord, expected_version: u64) -> Result<()> {
        let key = Self::component_key(&record.provider, &record.component_id);
        let current = self
            .components_tree
            .get(&key)?
            .ok_or_else(|| component_conflict(&record.provider, &record.component_id))?;

        let decoded: ComponentRecord = Self::decode(&current)?;
        if decoded.version != expected_version {
            return Err(component_conflict(&record.provider, &record.component_id));
        }

        let swapped = self.components_tree.compare_and_swap(
            key,
            Some(current),
            Some(Self::encode(record)?),
        )?;
        if swapped.is_err() {
            return Err(component_conflict(&record.provider, &record.component_id));
        }
        Ok(())
    }

    async fn list_components(&self, provider: &str) -> Result<Vec<ComponentRecord>> {
        let prefix = format!("{}\u{0}", provider).into_bytes();
        let mut components = self
            .components_tree
            .scan_prefix(prefix)
            .values()
            .map(|value| Self::decode::<ComponentRecord>(&value?))
            .collect::<Result<Vec<_>>>()?;
        sort_by_position(&mut components);
        Ok(components)
    }

    async fn list_degraded_components(&self) -> Result<Vec<ComponentRecord>> {
        let mut degraded: Vec<ComponentRecord> = self
            .scan_components()?
            .into_iter()
            .filter(|c| c.current_status.is_degraded())
            .collect();
        degraded.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(degraded)
    }

    async fn delete_stale_components(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for component in self.scan_components()? {
            if is_stale(&component, cutoff) {
                self.components_tree
                    .remove(Self::component_key(&component.provider, &component.component_id))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn health_check(&self) -> Result<()> {
        self.db.checksum()?;
        Ok(())
    }
}
