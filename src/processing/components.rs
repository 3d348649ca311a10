use crate::error::{AppError, Result};
use crate::models::{ComponentRecord, ComponentSnapshot};
use crate::state::{StatusCache, StatusStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Component registry kept current by webhook component events and by
/// provider component listings. Updates are version compare-and-swap with a
/// bounded retry loop.
pub struct ComponentRegistry {
    store: Arc<dyn StatusStore>,
    cache: StatusCache,
    max_attempts: u32,
}

impl ComponentRegistry {
    pub fn new(store: Arc<dyn StatusStore>, cache: StatusCache, max_attempts: u32) -> Self {
        Self {
            store,
            cache,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn refresh(&self, snapshot: &ComponentSnapshot) -> Result<ComponentRecord> {
        self.refresh_at(snapshot, Utc::now()).await
    }

    /// Upsert one component as of `now`
    pub async fn refresh_at(
        &self,
        snapshot: &ComponentSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ComponentRecord> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let existing = self
                .store
                .find_component(&snapshot.provider, &snapshot.component_id)
                .await?;

            let (record, result) = match existing {
                None => {
                    let record = ComponentRecord::from_snapshot(snapshot, now);
                    let result = self.store.insert_component(&record).await;
                    (record, result)
                }
                Some(current) => {
                    let record = current.refreshed(snapshot, now);
                    let result = self.store.update_component(&record, current.version).await;
                    if result.is_ok() && current.current_status != record.current_status {
                        tracing::info!(
                            provider = %record.provider,
                            component = %record.name,
                            from = %current.current_status,
                            to = %record.current_status,
                            "Component status changed"
                        );
                    }
                    (record, result)
                }
            };

            match result {
                Ok(()) => {
                    self.cache.put_component(&record).await;
                    return Ok(record);
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    tracing::debug!(
                        provider = %snapshot.provider,
                        component_id = %snapshot.component_id,
                        attempt = attempt,
                        "Component version moved, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Refresh a full provider listing; failures are logged per component
    pub async fn refresh_all(&self, snapshots: &[ComponentSnapshot]) -> usize {
        let mut refreshed = 0;
        for snapshot in snapshots {
            match self.refresh(snapshot).await {
                Ok(_) => refreshed += 1,
                Err(e) => tracing::error!(
                    provider = %snapshot.provider,
                    component_id = %snapshot.component_id,
                    error = %e,
                    "Failed to refresh component"
                ),
            }
        }
        refreshed
    }

    pub async fn components(&self, provider: &str) -> Result<Vec<ComponentRecord>> {
        self.store.list_components(&provider.to_ascii_lowercase()).await
    }

    pub async fn component(&self, provider: &str, component_id: &str) -> Result<ComponentRecord> {
        if let Some(record) = self.cache.get_component(provider, component_id).await {
            return Ok(record);
        }
        self.store
            .find_component(provider, component_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("component {}/{}", provider, component_id)))
    }

    pub async fn degraded(&self) -> Result<Vec<ComponentRecord>> {
        self.store.list_degraded_components().await
    }

    /// Remove operational components that have not been checked for `days`
    pub async fn prune_stale(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(days);
        let removed = self.store.delete_stale_components(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed = removed, "Pruned stale components");
        }
        Ok(removed)
    }
}
