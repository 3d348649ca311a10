//! Maintenance scheduler wired against a mocked provider

mod common;

use common::{incident_json, Pipeline};
use status_tracker::config::MaintenanceConfig;
use status_tracker::error::AppError;
use status_tracker::models::ComponentStatus;
use status_tracker::providers::{OpenAiStatusProvider, ProviderRegistry};
use status_tracker::scheduler::{
    register_maintenance_jobs, Job, JobId, JobMetadata, MaintenanceContext, SchedulerError,
    SchedulerService,
};
use status_tracker::state::StatusCache;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn context(pipeline: &Pipeline, base_url: &str) -> MaintenanceContext {
    let registry = ProviderRegistry::new();
    registry
        .register_provider(Arc::new(
            OpenAiStatusProvider::new(base_url, "p1", Duration::from_secs(2)).unwrap(),
        ))
        .unwrap();

    MaintenanceContext {
        providers: Arc::new(registry),
        sink: pipeline.processor.clone(),
        lifecycle: pipeline.lifecycle.clone(),
        components: pipeline.components.clone(),
        cache: StatusCache::disabled(),
        stale_component_days: 60,
    }
}

async fn job_id(scheduler: &SchedulerService, name: &str) -> JobId {
    scheduler
        .list_jobs()
        .await
        .into_iter()
        .find(|job| job.name == name)
        .map(|job| job.id)
        .unwrap()
}

#[tokio::test]
async fn test_scheduler_start_stop() {
    let mut scheduler = SchedulerService::new(true)
        .await
        .expect("Failed to create scheduler");

    scheduler.start().await.unwrap();
    assert!(scheduler.is_running().await);

    scheduler.shutdown().await.unwrap();
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn test_disabled_scheduler_does_not_start() {
    let mut scheduler = SchedulerService::new(false).await.unwrap();
    scheduler.start().await.unwrap();
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn test_failing_job_is_counted_not_fatal() {
    let scheduler = SchedulerService::new(true).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let id = scheduler
        .add_job(Job::new(JobMetadata::new("flaky", "0 0 * * * *"), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::Internal("first run fails".to_string()))
                } else {
                    Ok(())
                }
            }
        }))
        .await
        .unwrap();

    let first = scheduler.run_now(&id).await;
    assert!(matches!(first, Err(SchedulerError::JobExecutionFailed(_))));
    scheduler.run_now(&id).await.unwrap();

    let stats = scheduler.stats().await;
    assert_eq!(stats.total_executions, 2);
    assert_eq!(stats.total_failures, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_provider_sync_job_reconciles_incidents() {
    let mut server = mockito::Server::new_async().await;
    let _incidents = server
        .mock("GET", "/pages/p1/incidents.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "incidents": [incident_json("inc_1", "investigating", "Looking")]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let pipeline = Pipeline::new();
    let scheduler = SchedulerService::new(true).await.unwrap();
    register_maintenance_jobs(
        &scheduler,
        &MaintenanceConfig::default(),
        context(&pipeline, &server.url()),
    )
    .await
    .unwrap();

    scheduler
        .run_now(&job_id(&scheduler, "provider_sync").await)
        .await
        .unwrap();

    assert!(pipeline.record("openai", "inc_1").await.is_some());
}

#[tokio::test]
async fn test_component_refresh_job_fills_registry() {
    let mut server = mockito::Server::new_async().await;
    let _components = server
        .mock("GET", "/pages/p1/components.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "components": [
                    { "id": "cmp_api", "name": "API", "status": "operational", "position": 1 },
                    { "id": "cmp_chat", "name": "ChatGPT", "status": "major_outage", "position": 2 }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let pipeline = Pipeline::new();
    let scheduler = SchedulerService::new(true).await.unwrap();
    register_maintenance_jobs(
        &scheduler,
        &MaintenanceConfig::default(),
        context(&pipeline, &server.url()),
    )
    .await
    .unwrap();

    scheduler
        .run_now(&job_id(&scheduler, "component_refresh").await)
        .await
        .unwrap();

    let components = pipeline.components.components("openai").await.unwrap();
    assert_eq!(components.len(), 2);
    let degraded = pipeline.components.degraded().await.unwrap();
    assert_eq!(degraded.len(), 1);
    assert_eq!(degraded[0].current_status, ComponentStatus::MajorOutage);
}

#[tokio::test]
async fn test_connectivity_job_fails_when_no_provider_answers() {
    let mut server = mockito::Server::new_async().await;
    let _status = server
        .mock("GET", "/pages/p1/status.json")
        .with_status(503)
        .create_async()
        .await;

    let pipeline = Pipeline::new();
    let scheduler = SchedulerService::new(true).await.unwrap();
    register_maintenance_jobs(
        &scheduler,
        &MaintenanceConfig::default(),
        context(&pipeline, &server.url()),
    )
    .await
    .unwrap();

    let result = scheduler
        .run_now(&job_id(&scheduler, "provider_connectivity").await)
        .await;
    assert!(matches!(result, Err(SchedulerError::JobExecutionFailed(_))));
}
