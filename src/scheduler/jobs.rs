//! Job definitions and run bookkeeping

use crate::error::Result;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
}

/// Run history of one maintenance job
#[derive(Debug, Clone, Serialize)]
pub struct JobMetadata {
    pub id: JobId,
    pub name: String,
    pub description: Option<String>,
    /// Six-field cron expression (seconds first)
    pub schedule: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_duration_ms: f64,
    pub last_error: Option<String>,
}

impl JobMetadata {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            schedule: schedule.into(),
            status: JobStatus::Scheduled,
            created_at: Utc::now(),
            last_run: None,
            run_count: 0,
            success_count: 0,
            failure_count: 0,
            avg_duration_ms: 0.0,
            last_error: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn record_run(&mut self, error: Option<String>, duration_ms: u64) {
        self.run_count += 1;
        match error {
            None => {
                self.success_count += 1;
                self.status = JobStatus::Completed;
            }
            Some(e) => {
                self.failure_count += 1;
                self.status = JobStatus::Failed;
                self.last_error = Some(e);
            }
        }

        // Incremental mean
        self.avg_duration_ms = ((self.avg_duration_ms * (self.run_count - 1) as f64)
            + duration_ms as f64)
            / self.run_count as f64;

        self.last_run = Some(Utc::now());
    }
}

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A scheduled unit of work. The closure captures whatever services it needs.
pub struct Job {
    name: String,
    metadata: Arc<tokio::sync::RwLock<JobMetadata>>,
    run: JobFn,
}

impl Job {
    pub fn new<F, Fut>(metadata: JobMetadata, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: metadata.name.clone(),
            metadata: Arc::new(tokio::sync::RwLock::new(metadata)),
            run: Arc::new(move || Box::pin(run())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn metadata(&self) -> JobMetadata {
        self.metadata.read().await.clone()
    }

    /// Run once and record the outcome
    pub async fn execute(&self) -> Result<()> {
        let start = std::time::Instant::now();
        self.metadata.write().await.status = JobStatus::Running;

        let result = (self.run)().await;

        let duration_ms = start.elapsed().as_millis() as u64;
        self.metadata
            .write()
            .await
            .record_run(result.as_ref().err().map(|e| e.to_string()), duration_ms);

        result
    }
}
