use super::types::Position2D;
use crate::common::{DomainEvent, JobId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViolationDetails {
    pub violations: u32,
    pub collisions: u32,
}

/// Normalized snapshot of the best candidate at one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub iteration: usize,
    pub path: Vec<Position2D>,
    pub cost: f64,
    pub length: f64,
    pub details: ViolationDetails,
}

/// Everything pushed to subscribers. Serializes as
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OptimizationEvent {
    ConnectionStatus {
        status: String,
    },
    PathUpdate(ProgressEvent),
    #[serde(rename_all = "camelCase")]
    OptimizationError {
        job_id: JobId,
        message: String,
    },
}

impl OptimizationEvent {
    pub fn connected() -> Self {
        OptimizationEvent::ConnectionStatus {
            status: "connected".to_string(),
        }
    }
}

impl DomainEvent for OptimizationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OptimizationEvent::ConnectionStatus { .. } => "connection_status",
            OptimizationEvent::PathUpdate(_) => "path_update",
            OptimizationEvent::OptimizationError { .. } => "optimization_error",
        }
    }

    fn job_id(&self) -> Option<JobId> {
        match self {
            OptimizationEvent::ConnectionStatus { .. } => None,
            OptimizationEvent::PathUpdate(progress) => Some(progress.job_id),
            OptimizationEvent::OptimizationError { job_id, .. } => Some(*job_id),
        }
    }
}
