use crate::error::AppError;

pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Failures of the maintenance scheduler itself, not of the jobs it runs
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler could not start: {0}")]
    StartupFailed(String),

    #[error("scheduler could not shut down: {0}")]
    ShutdownFailed(String),

    #[error("could not register job: {0}")]
    JobCreationFailed(String),

    #[error("no job with id {0}")]
    JobNotFound(String),

    #[error("a job named '{0}' is already registered")]
    JobAlreadyExists(String),

    #[error("job run failed: {0}")]
    JobExecutionFailed(String),

    #[error("job '{job}' has an invalid schedule '{schedule}': {reason}")]
    InvalidCronExpression {
        job: String,
        schedule: String,
        reason: String,
    },
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::JobNotFound(id) => AppError::NotFound(format!("job {}", id)),
            SchedulerError::InvalidCronExpression { .. } => AppError::Configuration(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}
