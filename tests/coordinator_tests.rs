use pathopt_app::adapters::outbound::init_noop_logger;
use pathopt_app::application::OptimizationService;
use pathopt_app::common::{ApplicationError, DomainError, DomainResult, JobId};
use pathopt_app::config::CoordinatorConfig;
use pathopt_app::domains::path_optimization::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

#[derive(Debug)]
struct FixedPath(Vec<Position2D>);

impl PathSolution for FixedPath {
    fn path(&self) -> Vec<Position2D> {
        self.0.clone()
    }
}

fn candidate(cost: f64) -> Candidate {
    Candidate {
        cost,
        details: SolutionDetails {
            solution: Arc::new(FixedPath(vec![
                Position2D::new(5.0, 5.0),
                Position2D::new(95.0, 95.0),
            ])),
            violations: Some(0),
            collision_violation_count: None,
        },
    }
}

struct UnitCost;

impl CostFunction for UnitCost {
    fn evaluate(&self, _position: &[f64]) -> Candidate {
        candidate(1.0)
    }
}

struct UnitCostFactory;

impl CostFunctionFactory for UnitCostFactory {
    fn build(&self, _environment: Arc<Environment>, _params: &RunParameters) -> Arc<dyn CostFunction> {
        Arc::new(UnitCost)
    }
}

#[derive(Clone, Copy)]
enum Script {
    /// Reports every iteration, sleeping `step` between them, honours cancellation.
    Cooperative { step: Duration },
    /// Ignores cancellation and sleeps for `total` before returning.
    Stubborn { total: Duration },
    /// Honours cancellation, but takes `linger` to wind down once it sees it.
    Lingers { linger: Duration },
    /// Reports `after` iterations and then fails.
    Fails { after: usize },
    Panics,
    NoResult,
}

struct ScriptedOptimizer {
    script: Script,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl ScriptedOptimizer {
    fn new(script: Script) -> Self {
        Self {
            script,
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Optimizer for ScriptedOptimizer {
    fn optimize(
        &self,
        _problem: &Problem,
        params: &RunParameters,
        sink: &mut dyn IterationSink,
    ) -> DomainResult<Option<Candidate>> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let result = match self.script {
            Script::Cooperative { step } => {
                let mut best = None;
                for iteration in 0..params.max_iter {
                    let current = candidate(100.0 - iteration as f64);
                    best = Some(current.clone());
                    let flow = sink.report(IterationReport {
                        iteration,
                        global_best: current,
                    });
                    if flow.is_break() {
                        break;
                    }
                    thread::sleep(step);
                }
                Ok(best)
            }
            Script::Lingers { linger } => {
                let mut iteration = 0;
                while !sink.is_cancelled() {
                    let _ = sink.report(IterationReport {
                        iteration,
                        global_best: candidate(50.0),
                    });
                    iteration += 1;
                    thread::sleep(Duration::from_millis(2));
                }
                thread::sleep(linger);
                Ok(None)
            }
            Script::Stubborn { total } => {
                thread::sleep(total);
                Ok(None)
            }
            Script::Fails { after } => {
                for iteration in 0..after {
                    let _ = sink.report(IterationReport {
                        iteration,
                        global_best: candidate(10.0),
                    });
                }
                Err(DomainError::OptimizerRuntime("diverged".to_string()))
            }
            Script::Panics => panic!("solver exploded"),
            Script::NoResult => Ok(None),
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<OptimizationEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<OptimizationEvent> {
        self.events.lock().unwrap().clone()
    }

    fn updates_for(&self, job_id: JobId) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OptimizationEvent::PathUpdate(p) if p.job_id == job_id => Some(p),
                _ => None,
            })
            .collect()
    }

    fn errors(&self) -> Vec<(JobId, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OptimizationEvent::OptimizationError { job_id, message } => Some((job_id, message)),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, event: &OptimizationEvent) -> DomainResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn fast_config(stop_timeout_ms: u64) -> CoordinatorConfig {
    CoordinatorConfig {
        stop_timeout_ms,
        emit_pause_ms: 0,
        report_buffer: 1,
    }
}

fn service_with(
    optimizer: ScriptedOptimizer,
    stop_timeout_ms: u64,
) -> (OptimizationService, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let service = OptimizationService::assemble(
        &fast_config(stop_timeout_ms),
        Arc::new(optimizer),
        Arc::new(UnitCostFactory),
        sink.clone(),
        init_noop_logger(),
    );
    service
        .configure_environment(EnvironmentParams::default())
        .unwrap();
    (service, sink)
}

fn params(max_iter: usize) -> RunParameters {
    RunParameters {
        max_iter,
        ..RunParameters::default()
    }
}

async fn wait_until_idle(service: &OptimizationService, within: Duration) {
    let deadline = Instant::now() + within;
    while service.status().await.job_id.is_some() {
        assert!(Instant::now() < deadline, "job did not finish in time");
        sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_for_update(sink: &RecordingSink, job_id: JobId) {
    timeout(Duration::from_secs(2), async {
        while sink.updates_for(job_id).is_empty() {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("no progress event arrived");
}

#[tokio::test]
async fn completed_run_emits_each_iteration_then_the_final_result() {
    let (service, sink) = service_with(ScriptedOptimizer::new(Script::Cooperative { step: Duration::ZERO }), 1000);

    let job_id = service.run_optimization(params(5)).await.unwrap();
    wait_until_idle(&service, Duration::from_secs(2)).await;

    let iterations: Vec<usize> = sink.updates_for(job_id).iter().map(|e| e.iteration).collect();
    assert_eq!(iterations, vec![0, 1, 2, 3, 4, 5]);

    let last = sink.updates_for(job_id).pop().unwrap();
    assert_eq!(last.cost, 96.0);
    assert_eq!(last.details, ViolationDetails { violations: 0, collisions: 0 });
    assert!((last.length - 90.0 * 2f64.sqrt()).abs() < 1e-9);
    assert!(sink.errors().is_empty());
}

#[tokio::test]
async fn stop_on_idle_coordinator_is_a_no_op() {
    let (service, sink) = service_with(ScriptedOptimizer::new(Script::NoResult), 1000);

    assert_eq!(service.stop_optimization().await, StopOutcome::Idle);
    assert_eq!(service.stop_optimization().await, StopOutcome::Idle);
    assert_eq!(service.status().await, JobStatus::idle());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn stop_cancels_a_running_job_and_frees_the_slot() {
    let (service, sink) = service_with(
        ScriptedOptimizer::new(Script::Cooperative { step: Duration::from_millis(5) }),
        1000,
    );

    let job_id = service.run_optimization(params(10_000)).await.unwrap();
    wait_for_update(&sink, job_id).await;
    assert_eq!(service.status().await.state, "running");

    assert_eq!(service.stop_optimization().await, StopOutcome::Stopped(job_id));
    assert_eq!(service.status().await, JobStatus::idle());

    let seen = sink.updates_for(job_id).len();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.updates_for(job_id).len(), seen, "events leaked after stop");
    assert!(seen < 10_000);
}

#[tokio::test]
async fn restarting_discards_events_from_the_superseded_job() {
    let (service, sink) = service_with(
        ScriptedOptimizer::new(Script::Cooperative { step: Duration::from_millis(2) }),
        1000,
    );

    let first = service.run_optimization(params(10_000)).await.unwrap();
    let second = service.run_optimization(params(10_000)).await.unwrap();
    assert_ne!(first, second);
    wait_for_update(&sink, second).await;
    sleep(Duration::from_millis(30)).await;
    service.stop_optimization().await;

    let events = sink.events();
    let first_of_second = events
        .iter()
        .position(|e| matches!(e, OptimizationEvent::PathUpdate(p) if p.job_id == second))
        .unwrap();
    assert!(events[first_of_second..]
        .iter()
        .all(|e| !matches!(e, OptimizationEvent::PathUpdate(p) if p.job_id == first)));
}

#[tokio::test]
async fn job_ignoring_cancellation_is_orphaned_and_keeps_the_slot() {
    let (service, _sink) = service_with(
        ScriptedOptimizer::new(Script::Stubborn { total: Duration::from_millis(300) }),
        30,
    );

    let job_id = service.run_optimization(params(10)).await.unwrap();
    assert_eq!(service.stop_optimization().await, StopOutcome::Orphaned(job_id));
    assert_eq!(service.status().await.state, "orphaned");

    match service.run_optimization(params(10)).await {
        Err(ApplicationError::JobStillTerminating { job_id: stuck }) => assert_eq!(stuck, job_id),
        other => panic!("expected JobStillTerminating, got {:?}", other.map(|_| ())),
    }

    wait_until_idle(&service, Duration::from_secs(2)).await;
    tokio_test::assert_ok!(service.run_optimization(params(10)).await);
}

#[tokio::test]
async fn optimizer_failure_emits_one_error_and_releases_the_slot() {
    let (service, sink) = service_with(ScriptedOptimizer::new(Script::Fails { after: 2 }), 1000);

    let job_id = service.run_optimization(params(10)).await.unwrap();
    wait_until_idle(&service, Duration::from_secs(2)).await;

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, job_id);
    assert!(errors[0].1.contains("diverged"));

    let events = sink.events();
    assert!(matches!(events.last(), Some(OptimizationEvent::OptimizationError { .. })));
    assert_eq!(sink.updates_for(job_id).len(), 2);
}

#[tokio::test]
async fn optimizer_panic_is_reported_as_an_error_event() {
    let (service, sink) = service_with(ScriptedOptimizer::new(Script::Panics), 1000);

    service.run_optimization(params(10)).await.unwrap();
    wait_until_idle(&service, Duration::from_secs(2)).await;

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.contains("solver exploded"));
}

#[tokio::test]
async fn run_without_result_emits_nothing() {
    let (service, sink) = service_with(ScriptedOptimizer::new(Script::NoResult), 1000);

    service.run_optimization(params(10)).await.unwrap();
    wait_until_idle(&service, Duration::from_secs(2)).await;
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn run_requires_a_configured_environment() {
    let sink = Arc::new(RecordingSink::default());
    let service = OptimizationService::assemble(
        &fast_config(1000),
        Arc::new(ScriptedOptimizer::new(Script::NoResult)),
        Arc::new(UnitCostFactory),
        sink,
        init_noop_logger(),
    );

    let result = service.run_optimization(params(10)).await;
    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::NoEnvironment))
    ));
    assert_eq!(service.status().await, JobStatus::idle());
}

#[tokio::test]
async fn invalid_parameters_leave_the_running_job_alone() {
    let (service, sink) = service_with(
        ScriptedOptimizer::new(Script::Cooperative { step: Duration::from_millis(5) }),
        1000,
    );

    let job_id = service.run_optimization(params(10_000)).await.unwrap();
    wait_for_update(&sink, job_id).await;

    let result = service.run_optimization(params(0)).await;
    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::Validation { .. }))
    ));
    assert_eq!(service.status().await.job_id, Some(job_id));

    service.stop_optimization().await;
}

#[tokio::test]
async fn disconnect_drives_a_running_job_to_termination() {
    let (service, sink) = service_with(
        ScriptedOptimizer::new(Script::Cooperative { step: Duration::from_millis(5) }),
        500,
    );

    let job_id = service.run_optimization(params(10_000)).await.unwrap();
    wait_for_update(&sink, job_id).await;
    let (watched, mut state) = service.coordinator().watch_current().await.unwrap();
    assert_eq!(watched, job_id);

    let started = Instant::now();
    assert_eq!(service.on_disconnect().await, StopOutcome::Stopped(job_id));
    assert!(started.elapsed() < Duration::from_millis(500));

    let terminal = timeout(Duration::from_millis(100), state.wait_for(JobState::is_terminal))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(terminal, JobState::Terminated);
    assert_eq!(service.status().await, JobStatus::idle());
}

#[tokio::test]
async fn disconnect_is_skipped_when_a_subscriber_reattached() {
    let (service, sink) = service_with(
        ScriptedOptimizer::new(Script::Cooperative { step: Duration::from_millis(5) }),
        500,
    );

    let job_id = service.run_optimization(params(10_000)).await.unwrap();
    wait_for_update(&sink, job_id).await;

    assert_eq!(service.on_disconnect_when(|| false).await, None);
    assert_eq!(service.status().await.state, "running");

    assert_eq!(
        service.on_disconnect_when(|| true).await,
        Some(StopOutcome::Stopped(job_id))
    );
    assert_eq!(service.status().await, JobStatus::idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_passes_through_stopping_before_terminated() {
    let (service, sink) = service_with(
        ScriptedOptimizer::new(Script::Lingers { linger: Duration::from_millis(150) }),
        1000,
    );
    let service = Arc::new(service);

    let job_id = service.run_optimization(params(10_000)).await.unwrap();
    wait_for_update(&sink, job_id).await;
    let (_, mut state) = service.coordinator().watch_current().await.unwrap();
    assert_eq!(*state.borrow(), JobState::Running);

    let disconnect = {
        let service = service.clone();
        tokio::spawn(async move { service.on_disconnect().await })
    };

    let seen = timeout(
        Duration::from_millis(100),
        state.wait_for(|s| *s == JobState::Stopping),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(seen, JobState::Stopping);

    let terminal = timeout(Duration::from_secs(1), state.wait_for(JobState::is_terminal))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(terminal, JobState::Terminated);

    assert_eq!(disconnect.await.unwrap(), StopOutcome::Stopped(job_id));
    assert_eq!(service.status().await, JobStatus::idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_run_two_jobs_at_once() {
    let optimizer = ScriptedOptimizer::new(Script::Cooperative { step: Duration::from_millis(1) });
    let max_running = optimizer.max_running.clone();
    let (service, _sink) = service_with(optimizer, 2000);
    let service = Arc::new(service);

    let mut tasks = Vec::new();
    for i in 0..24 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            match i % 3 {
                0 => {
                    let _ = service.run_optimization(params(50)).await;
                }
                1 => {
                    service.stop_optimization().await;
                }
                _ => {
                    service.on_disconnect().await;
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    service.stop_optimization().await;

    assert_eq!(max_running.load(Ordering::SeqCst), 1);
    assert_eq!(service.status().await, JobStatus::idle());
}
