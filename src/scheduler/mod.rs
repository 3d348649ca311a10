//! Maintenance scheduler
//!
//! Cron-driven jobs on tokio-cron-scheduler: provider connectivity checks,
//! full provider syncs, component registry refresh and an hourly health
//! report.
//!
//! ```no_run
//! use status_tracker::scheduler::SchedulerService;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scheduler = SchedulerService::new(true).await?;
//! scheduler.start().await?;
//! scheduler.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod core;
mod error;
mod jobs;
mod tasks;

pub use self::core::{SchedulerService, SchedulerStats};
pub use error::{SchedulerError, SchedulerResult};
pub use jobs::{Job, JobId, JobMetadata, JobStatus};
pub use tasks::{
    check_provider_connectivity, refresh_components, register_maintenance_jobs, report_health,
    sync_provider_status, MaintenanceContext,
};
