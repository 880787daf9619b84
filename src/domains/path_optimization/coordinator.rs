use super::environment::EnvironmentStore;
use super::job::{
    run_worker, ChannelSink, JobHandle, JobState, JobStatus, StopOutcome, WorkerOutcome,
};
use super::ports::{CostFunctionFactory, IterationReport, Optimizer, Problem};
use super::publisher::ProgressPublisher;
use super::types::RunParameters;
use crate::common::{ApplicationError, ApplicationResult, DomainError, JobId};
use crate::domains::logger::DynLogger;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch, Mutex, MutexGuard};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// How long start/stop wait for a cancelled job to confirm termination.
    pub stop_timeout: Duration,
    /// Capacity of the report channel between worker and publisher.
    pub report_buffer: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(1),
            report_buffer: 1,
        }
    }
}

type Slot = Arc<Mutex<Option<JobHandle>>>;

/// Owns the single current-job slot.
///
/// Every start/stop/disconnect runs under the slot mutex, so at most one job
/// is ever outside a terminal state. A job stays in the slot until its
/// termination is confirmed; one that ignores cancellation past
/// `stop_timeout` is marked orphaned and keeps the slot occupied.
pub struct JobCoordinator {
    environment: Arc<EnvironmentStore>,
    optimizer: Arc<dyn Optimizer>,
    costs: Arc<dyn CostFunctionFactory>,
    publisher: Arc<ProgressPublisher>,
    settings: CoordinatorSettings,
    slot: Slot,
    logger: DynLogger,
}

impl JobCoordinator {
    pub fn new(
        environment: Arc<EnvironmentStore>,
        optimizer: Arc<dyn Optimizer>,
        costs: Arc<dyn CostFunctionFactory>,
        publisher: Arc<ProgressPublisher>,
        settings: CoordinatorSettings,
        logger: DynLogger,
    ) -> Self {
        Self {
            environment,
            optimizer,
            costs,
            publisher,
            settings,
            slot: Arc::new(Mutex::new(None)),
            logger,
        }
    }

    /// Accept a new run, replacing any active one. Returns once the job is
    /// spawned; completion is only observable through published events.
    pub async fn start(&self, params: RunParameters) -> ApplicationResult<JobId> {
        params.validate()?;
        let num_var = params.num_var()?;

        let mut slot = self.slot.lock().await;
        if let Some(current) = slot.take() {
            self.logger.info(&format!(
                "Replacing job {} with a new run",
                current.id.short()
            ));
            if !self.cancel_and_wait(&current).await {
                let job_id = current.id;
                current.mark_orphaned();
                *slot = Some(current);
                return Err(ApplicationError::JobStillTerminating { job_id });
            }
        }

        let environment = self.environment.snapshot().ok_or(DomainError::NoEnvironment)?;

        let job_id = JobId::new();
        let token = CancellationToken::new();
        let state = Arc::new(watch::channel(JobState::Running).0);
        let (report_tx, report_rx) = mpsc::channel(self.settings.report_buffer.max(1));
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let runtime = Handle::try_current().map_err(|e| ApplicationError::JobSpawn(e.to_string()))?;
        let cost_function = self.costs.build(environment, &params);
        let problem = Problem::unit_box(num_var, cost_function);
        let optimizer = self.optimizer.clone();
        let max_iter = params.max_iter;
        let sink = ChannelSink::new(report_tx, token.clone());

        // Open the gate before the worker can report anything.
        self.publisher.activate(job_id);
        let spawned = thread::Builder::new()
            .name(format!("optimizer-{}", job_id.short()))
            .spawn(move || run_worker(optimizer, problem, params, sink, outcome_tx));
        if let Err(e) = spawned {
            self.publisher.deactivate(job_id);
            self.logger
                .error(&format!("Failed to spawn worker for job {}: {}", job_id.short(), e));
            return Err(ApplicationError::JobSpawn(e.to_string()));
        }

        let supervisor = Supervisor {
            job_id,
            max_iter,
            publisher: self.publisher.clone(),
            state: state.clone(),
            slot: self.slot.clone(),
            logger: self.logger.clone(),
        };
        runtime.spawn(supervisor.run(report_rx, outcome_rx));

        *slot = Some(JobHandle::new(job_id, token, state));
        self.logger.info(&format!("Optimization job {} started", job_id.short()));
        Ok(job_id)
    }

    /// Cancel the current job, if any. Idempotent.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// The transport lost its last subscriber.
    pub async fn on_disconnect(&self) -> StopOutcome {
        self.logger
            .info("Last subscriber disconnected; stopping current optimization");
        self.stop().await
    }

    /// Like `on_disconnect`, but `unattended` is re-checked under the slot
    /// lock. A subscriber that attached (and possibly started a run) since
    /// the disconnect was noticed keeps the job alive; returns `None` then.
    pub async fn on_disconnect_when<F>(&self, unattended: F) -> Option<StopOutcome>
    where
        F: FnOnce() -> bool,
    {
        let mut slot = self.slot.lock().await;
        if !unattended() {
            self.logger
                .info("Subscriber reattached before disconnect handling; job kept");
            return None;
        }
        self.logger
            .info("Last subscriber disconnected; stopping current optimization");
        Some(self.stop_locked(&mut slot).await)
    }

    async fn stop_locked(&self, slot: &mut MutexGuard<'_, Option<JobHandle>>) -> StopOutcome {
        let Some(current) = slot.take() else {
            return StopOutcome::Idle;
        };

        let job_id = current.id;
        if self.cancel_and_wait(&current).await {
            self.logger.info(&format!("Optimization job {} stopped", job_id.short()));
            StopOutcome::Stopped(job_id)
        } else {
            self.logger.warn(&format!(
                "Job {} did not stop within {:?}; marked orphaned",
                job_id.short(),
                self.settings.stop_timeout
            ));
            current.mark_orphaned();
            **slot = Some(current);
            StopOutcome::Orphaned(job_id)
        }
    }

    pub async fn status(&self) -> JobStatus {
        self.slot
            .lock()
            .await
            .as_ref()
            .map_or_else(JobStatus::idle, JobHandle::status)
    }

    /// State updates for the job currently in the slot.
    pub async fn watch_current(&self) -> Option<(JobId, watch::Receiver<JobState>)> {
        self.slot
            .lock()
            .await
            .as_ref()
            .map(|job| (job.id, job.subscribe()))
    }

    /// Returns true once the job reached a terminal state within the bound.
    async fn cancel_and_wait(&self, job: &JobHandle) -> bool {
        self.publisher.deactivate(job.id);
        job.request_stop();

        let mut state = job.subscribe();
        // Err(RecvError) inside Ok means the sender is gone, i.e. the job is finished.
        let finished = matches!(
            timeout(self.settings.stop_timeout, state.wait_for(JobState::is_terminal)).await,
            Ok(_)
        );
        finished
    }
}

/// Drives one job from the async side: drains reports into the publisher,
/// records the terminal state and releases the slot.
struct Supervisor {
    job_id: JobId,
    max_iter: usize,
    publisher: Arc<ProgressPublisher>,
    state: Arc<watch::Sender<JobState>>,
    slot: Slot,
    logger: DynLogger,
}

impl Supervisor {
    async fn run(
        self,
        mut reports: mpsc::Receiver<IterationReport>,
        outcome: oneshot::Receiver<WorkerOutcome>,
    ) {
        while let Some(report) = reports.recv().await {
            self.publisher.publish_iteration(self.job_id, &report).await;
        }

        let terminal = match outcome.await {
            Ok(Ok(Some(best))) => {
                self.publisher
                    .publish_final(self.job_id, self.max_iter, &best)
                    .await;
                JobState::Terminated
            }
            Ok(Ok(None)) => {
                self.logger.info(&format!(
                    "Job {} finished without a result",
                    self.job_id.short()
                ));
                JobState::Terminated
            }
            Ok(Err(e)) => self.fail(e.to_string()),
            Err(_) => self.fail("worker exited without reporting an outcome".to_string()),
        };

        self.state.send_replace(terminal);
        self.publisher.deactivate(self.job_id);

        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|job| job.id == self.job_id) {
            *slot = None;
        }
    }

    fn fail(&self, message: String) -> JobState {
        self.logger.error(&format!(
            "Error in optimization job {}: {}",
            self.job_id.short(),
            message
        ));
        self.publisher.publish_error(self.job_id, message.clone());
        JobState::Failed(message)
    }
}
