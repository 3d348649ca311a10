//! Maintenance tasks run by the scheduler

use super::jobs::{Job, JobMetadata};
use super::SchedulerService;
use super::SchedulerResult;
use crate::config::MaintenanceConfig;
use crate::error::{AppError, Result};
use crate::processing::{ComponentRegistry, EventSink, IncidentLifecycle};
use crate::providers::ProviderRegistry;
use crate::state::StatusCache;
use std::sync::Arc;
use tracing::{info, warn};

/// Services the maintenance jobs operate on
#[derive(Clone)]
pub struct MaintenanceContext {
    pub providers: Arc<ProviderRegistry>,
    pub sink: Arc<dyn EventSink>,
    pub lifecycle: Arc<IncidentLifecycle>,
    pub components: Arc<ComponentRegistry>,
    pub cache: StatusCache,
    pub stale_component_days: i64,
}

/// Probe every provider and cache the result.
///
/// Fails only when there are providers and none of them answered.
pub async fn check_provider_connectivity(ctx: &MaintenanceContext) -> Result<()> {
    let health = ctx.providers.health_all().await;

    for (provider, healthy) in &health {
        ctx.cache.put_provider_health(provider, *healthy).await;
        if !healthy {
            warn!(provider = %provider, "Provider health check failed");
        }
    }

    if !health.is_empty() && health.values().all(|healthy| !healthy) {
        return Err(AppError::ProviderUnavailable {
            provider: "*".to_string(),
            message: "no provider reachable".to_string(),
        });
    }
    Ok(())
}

/// Full sync of every provider through the reconciliation pipeline
pub async fn sync_provider_status(ctx: &MaintenanceContext) -> Result<()> {
    let reports = ctx.providers.sync_all(ctx.sink.as_ref()).await;

    let fetched: usize = reports.iter().map(|r| r.fetched).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    info!(providers = reports.len(), fetched = fetched, failed = failed, "Provider status sync completed");
    Ok(())
}

/// Refresh every provider's component listing, then prune stale entries
pub async fn refresh_components(ctx: &MaintenanceContext) -> Result<()> {
    let mut refreshed = 0;
    for provider in ctx.providers.providers() {
        match provider.list_components().await {
            Ok(snapshots) => refreshed += ctx.components.refresh_all(&snapshots).await,
            Err(e) => warn!(provider = %provider.name(), error = %e, "Component listing failed"),
        }
    }

    let pruned = ctx.components.prune_stale(ctx.stale_component_days).await?;
    info!(refreshed = refreshed, pruned = pruned, "Component registry refreshed");
    Ok(())
}

/// Hourly summary line
pub async fn report_health(ctx: &MaintenanceContext) -> Result<()> {
    let health = ctx.providers.health_all().await;
    let healthy = health.values().filter(|h| **h).count();
    let active = ctx.lifecycle.active_incidents().await?.len();
    let degraded = ctx.components.degraded().await?.len();

    info!(
        healthy_providers = healthy,
        total_providers = health.len(),
        active_incidents = active,
        degraded_components = degraded,
        "Hourly health report"
    );
    Ok(())
}

/// Register the four maintenance jobs with their configured schedules
pub async fn register_maintenance_jobs(
    scheduler: &SchedulerService,
    config: &MaintenanceConfig,
    ctx: MaintenanceContext,
) -> SchedulerResult<()> {
    let c = ctx.clone();
    scheduler
        .add_job(Job::new(
            JobMetadata::new("provider_connectivity", &config.connectivity_check_schedule)
                .with_description("Probe provider status endpoints"),
            move || {
                let c = c.clone();
                async move { check_provider_connectivity(&c).await }
            },
        ))
        .await?;

    let c = ctx.clone();
    scheduler
        .add_job(Job::new(
            JobMetadata::new("provider_sync", &config.provider_sync_schedule)
                .with_description("Full incident sync of every provider"),
            move || {
                let c = c.clone();
                async move { sync_provider_status(&c).await }
            },
        ))
        .await?;

    let c = ctx.clone();
    scheduler
        .add_job(Job::new(
            JobMetadata::new("component_refresh", &config.component_refresh_schedule)
                .with_description("Refresh and prune the component registry"),
            move || {
                let c = c.clone();
                async move { refresh_components(&c).await }
            },
        ))
        .await?;

    let c = ctx;
    scheduler
        .add_job(Job::new(
            JobMetadata::new("health_report", &config.health_report_schedule)
                .with_description("Hourly provider and incident summary"),
            move || {
                let c = c.clone();
                async move { report_health(&c).await }
            },
        ))
        .await?;

    Ok(())
}
