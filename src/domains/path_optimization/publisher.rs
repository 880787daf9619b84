use super::events::{OptimizationEvent, ProgressEvent, ViolationDetails};
use super::ports::{Candidate, IterationReport, ProgressSink};
use super::types::Position2D;
use crate::common::{DomainError, DomainEvent, DomainResult, JobId};
use crate::domains::logger::DynLogger;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Sum of Euclidean distances between consecutive points; 0 for fewer than two.
pub fn path_length(points: &[Position2D]) -> f64 {
    points
        .windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .sum()
}

/// Turn a candidate into the event pushed to subscribers.
pub fn format_progress(
    job_id: JobId,
    iteration: usize,
    candidate: &Candidate,
) -> DomainResult<ProgressEvent> {
    if !candidate.cost.is_finite() {
        return Err(DomainError::Formatting(format!(
            "cost {} is not a finite number",
            candidate.cost
        )));
    }

    let path = candidate.details.solution.path();
    if let Some(index) = path.iter().position(|p| !p.is_finite()) {
        return Err(DomainError::Formatting(format!(
            "path point {} has non-finite coordinates",
            index
        )));
    }

    let length = path_length(&path);
    Ok(ProgressEvent {
        job_id,
        iteration,
        path,
        cost: candidate.cost,
        length,
        details: ViolationDetails {
            violations: candidate.details.violations.unwrap_or(0),
            collisions: candidate.details.collision_violation_count.unwrap_or(0),
        },
    })
}

/// Consumes a job's iteration reports and pushes normalized events.
///
/// Emission is gated on the active job id: an event is delivered only while
/// its job is the one the coordinator last activated. The gate lock is held
/// across the check and the send so activation cannot interleave with them.
pub struct ProgressPublisher {
    sink: Arc<dyn ProgressSink>,
    active: Mutex<Option<JobId>>,
    emit_pause: Duration,
    logger: DynLogger,
}

impl ProgressPublisher {
    pub fn new(sink: Arc<dyn ProgressSink>, emit_pause: Duration, logger: DynLogger) -> Self {
        Self {
            sink,
            active: Mutex::new(None),
            emit_pause,
            logger,
        }
    }

    pub fn activate(&self, job_id: JobId) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(job_id);
    }

    /// Close the gate for `job_id`; a newer activation is left alone.
    pub fn deactivate(&self, job_id: JobId) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active == Some(job_id) {
            *active = None;
        }
    }

    pub fn active_job(&self) -> Option<JobId> {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether an event was delivered.
    pub async fn publish_iteration(&self, job_id: JobId, report: &IterationReport) -> bool {
        self.publish_candidate(job_id, report.iteration, &report.global_best)
            .await
    }

    /// Converged result, tagged with the configured iteration cap.
    pub async fn publish_final(&self, job_id: JobId, max_iter: usize, best: &Candidate) -> bool {
        self.publish_candidate(job_id, max_iter, best).await
    }

    pub fn publish_error(&self, job_id: JobId, message: String) -> bool {
        self.emit(OptimizationEvent::OptimizationError { job_id, message })
    }

    async fn publish_candidate(&self, job_id: JobId, iteration: usize, candidate: &Candidate) -> bool {
        let progress = match format_progress(job_id, iteration, candidate) {
            Ok(progress) => progress,
            Err(e) => {
                self.logger
                    .error(&format!("Job {}: iteration {} skipped: {}", job_id.short(), iteration, e));
                return false;
            }
        };

        let (cost, length) = (progress.cost, progress.length);
        if !self.emit(OptimizationEvent::PathUpdate(progress)) {
            return false;
        }
        self.logger.info(&format!(
            "Job {}: iteration {}: cost = {:.2}, length = {:.2}",
            job_id.short(),
            iteration,
            cost,
            length
        ));

        // Give the transport a chance to flush before the next report.
        tokio::time::sleep(self.emit_pause).await;
        true
    }

    fn emit(&self, event: OptimizationEvent) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if event.job_id().is_some() && *active != event.job_id() {
            return false;
        }
        match self.sink.publish(&event) {
            Ok(()) => true,
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to deliver {}: {}", event.event_type(), e));
                false
            }
        }
    }
}
