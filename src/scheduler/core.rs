//! Scheduler service on top of tokio-cron-scheduler

use super::error::{SchedulerError, SchedulerResult};
use super::jobs::{Job, JobId, JobMetadata, JobStatus};
use crate::metrics;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio_cron_scheduler::{JobScheduler, JobSchedulerError};
use tracing::{debug, error, info, warn};

/// Runs named maintenance jobs. A failing job is logged and counted; it
/// never stops the scheduler or the other jobs.
pub struct SchedulerService {
    enabled: bool,
    scheduler: JobScheduler,
    jobs: Arc<DashMap<JobId, Arc<Job>>>,
    running: Arc<tokio::sync::RwLock<bool>>,
}

impl SchedulerService {
    pub async fn new(enabled: bool) -> SchedulerResult<Self> {
        info!("Initializing scheduler service");

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        Ok(Self {
            enabled,
            scheduler,
            jobs: Arc::new(DashMap::new()),
            running: Arc::new(tokio::sync::RwLock::new(false)),
        })
    }

    pub async fn start(&mut self) -> SchedulerResult<()> {
        if !self.enabled {
            info!("Scheduler is disabled in configuration");
            return Ok(());
        }

        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Scheduler is already running");
                return Ok(());
            }
            *running = true;
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        info!(jobs = self.jobs.len(), "Scheduler service started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        {
            let mut running = self.running.write().await;
            if !*running {
                return Ok(());
            }
            *running = false;
        }

        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::ShutdownFailed(e.to_string()))?;

        info!("Scheduler service shut down");
        Ok(())
    }

    pub async fn add_job(&self, job: Job) -> SchedulerResult<JobId> {
        let metadata = job.metadata().await;
        let job_id = metadata.id;
        let job_name = metadata.name.clone();

        if self.jobs.iter().any(|entry| entry.value().name() == job_name) {
            return Err(SchedulerError::JobAlreadyExists(job_name));
        }

        let job = Arc::new(job);
        let scheduled = job.clone();
        let cron_job = tokio_cron_scheduler::Job::new_async(metadata.schedule.as_str(), move |_uuid, _l| {
            let job = scheduled.clone();
            Box::pin(async move {
                let job_name = job.name().to_string();
                debug!(job_name = %job_name, "Executing scheduled job");

                let start = std::time::Instant::now();
                let result = job.execute().await;
                let duration = start.elapsed();
                metrics::record_job_run(&job_name, result.is_ok());

                match result {
                    Ok(()) => info!(
                        job_name = %job_name,
                        duration_ms = duration.as_millis(),
                        "Job executed successfully"
                    ),
                    Err(e) => error!(
                        job_name = %job_name,
                        error = %e,
                        duration_ms = duration.as_millis(),
                        "Job execution failed"
                    ),
                }
            })
        })
        .map_err(|e: JobSchedulerError| SchedulerError::InvalidCronExpression {
            job: job_name.clone(),
            schedule: metadata.schedule.clone(),
            reason: e.to_string(),
        })?;

        self.scheduler
            .add(cron_job)
            .await
            .map_err(|e| SchedulerError::JobCreationFailed(e.to_string()))?;

        self.jobs.insert(job_id, job);
        info!(job_name = %job_name, schedule = %metadata.schedule, "Job scheduled");

        Ok(job_id)
    }

    /// Run a registered job immediately, outside its schedule
    pub async fn run_now(&self, job_id: &JobId) -> SchedulerResult<()> {
        let job = self
            .jobs
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        job.execute()
            .await
            .map_err(|e| SchedulerError::JobExecutionFailed(e.to_string()))
    }

    pub async fn list_jobs(&self) -> Vec<JobMetadata> {
        let jobs: Vec<Arc<Job>> = self.jobs.iter().map(|e| e.value().clone()).collect();
        let mut listed = Vec::with_capacity(jobs.len());
        for job in jobs {
            listed.push(job.metadata().await);
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        listed
    }

    pub async fn stats(&self) -> SchedulerStats {
        let jobs = self.list_jobs().await;

        let total_executions: u64 = jobs.iter().map(|j| j.run_count).sum();
        let total_failures: u64 = jobs.iter().map(|j| j.failure_count).sum();

        SchedulerStats {
            total_jobs: jobs.len(),
            running_jobs: jobs.iter().filter(|j| j.status == JobStatus::Running).count(),
            total_executions,
            total_failures,
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub total_jobs: usize,
    pub running_jobs: usize,
    pub total_executions: u64,
    pub total_failures: u64,
}
