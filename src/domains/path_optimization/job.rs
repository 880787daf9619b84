use super::ports::{Candidate, IterationReport, IterationSink, Optimizer, Problem};
use super::types::RunParameters;
use crate::common::{DomainError, DomainResult, JobId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopping,
    /// Stop was requested but termination was not confirmed within the bound.
    Orphaned,
    Terminated,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Terminated | JobState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Stopping => "stopping",
            JobState::Orphaned => "orphaned",
            JobState::Terminated => "terminated",
            JobState::Failed(_) => "failed",
        }
    }
}

/// What `stop` found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Idle,
    Stopped(JobId),
    Orphaned(JobId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub fn idle() -> Self {
        Self {
            state: "idle".to_string(),
            job_id: None,
            started_at: None,
        }
    }
}

/// The coordinator's record of the job occupying the slot.
pub struct JobHandle {
    pub id: JobId,
    pub started_at: DateTime<Utc>,
    token: CancellationToken,
    state: Arc<watch::Sender<JobState>>,
}

impl JobHandle {
    pub(crate) fn new(
        id: JobId,
        token: CancellationToken,
        state: Arc<watch::Sender<JobState>>,
    ) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            token,
            state,
        }
    }

    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Signal cancellation and move a running job to `Stopping`.
    pub fn request_stop(&self) {
        self.token.cancel();
        self.state.send_if_modified(|state| {
            if *state == JobState::Running {
                *state = JobState::Stopping;
                true
            } else {
                false
            }
        });
    }

    pub fn mark_orphaned(&self) {
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = JobState::Orphaned;
                true
            }
        });
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            state: self.state().label().to_string(),
            job_id: Some(self.id),
            started_at: Some(self.started_at),
        }
    }
}

/// Optimizer-side end of the report channel.
pub(crate) struct ChannelSink {
    reports: mpsc::Sender<IterationReport>,
    token: CancellationToken,
}

impl ChannelSink {
    pub(crate) fn new(reports: mpsc::Sender<IterationReport>, token: CancellationToken) -> Self {
        Self { reports, token }
    }
}

impl IterationSink for ChannelSink {
    fn report(&mut self, report: IterationReport) -> ControlFlow<()> {
        if self.token.is_cancelled() {
            return ControlFlow::Break(());
        }
        // Bounded channel: blocks the worker thread until the publisher catches up.
        if self.reports.blocking_send(report).is_err() {
            return ControlFlow::Break(());
        }
        if self.token.is_cancelled() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.reports.is_closed()
    }
}

pub(crate) type WorkerOutcome = DomainResult<Option<Candidate>>;

/// Body of the worker thread. Panics inside the optimizer are turned into
/// `OptimizerRuntime` errors so the supervisor always gets an outcome.
pub(crate) fn run_worker(
    optimizer: Arc<dyn Optimizer>,
    problem: Problem,
    params: RunParameters,
    mut sink: ChannelSink,
    outcome: oneshot::Sender<WorkerOutcome>,
) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        optimizer.optimize(&problem, &params, &mut sink)
    }))
    .unwrap_or_else(|payload| Err(DomainError::OptimizerRuntime(panic_message(payload))));

    // Closing the report channel lets the supervisor drain and move on.
    drop(sink);
    let _ = outcome.send(result);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("optimizer panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("optimizer panicked: {}", msg)
    } else {
        "optimizer panicked".to_string()
    }
}
