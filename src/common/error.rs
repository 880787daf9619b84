use crate::common::JobId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid configuration: {reason}")]
    Validation { reason: String },

    #[error("No environment has been configured; call configure-environment first")]
    NoEnvironment,

    #[error("Failed to format progress event: {0}")]
    Formatting(String),

    #[error("Optimizer failed: {0}")]
    OptimizerRuntime(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn validation(reason: impl Into<String>) -> Self {
        DomainError::Validation {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Failed to spawn optimization job: {0}")]
    JobSpawn(String),

    #[error("Job {job_id} did not stop within the cancellation bound and is still terminating")]
    JobStillTerminating { job_id: JobId },

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
