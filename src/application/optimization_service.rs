use crate::common::{ApplicationResult, JobId};
use crate::config::CoordinatorConfig;
use crate::domains::logger::DynLogger;
use crate::domains::path_optimization::{
    CostFunctionFactory, Environment, EnvironmentParams, EnvironmentStore, JobCoordinator,
    JobStatus, Optimizer, ProgressPublisher, ProgressSink, RunParameters, StopOutcome,
};
use std::sync::Arc;

/// Explicit context for one service instance: the environment store and the
/// coordinator that owns the job slot. Transports talk to this, never to
/// process-wide state.
pub struct OptimizationService {
    environment: Arc<EnvironmentStore>,
    coordinator: Arc<JobCoordinator>,
    logger: DynLogger,
}

impl OptimizationService {
    pub fn new(
        environment: Arc<EnvironmentStore>,
        coordinator: Arc<JobCoordinator>,
        logger: DynLogger,
    ) -> Self {
        Self {
            environment,
            coordinator,
            logger,
        }
    }

    /// Wire a store, publisher and coordinator around the given collaborators.
    pub fn assemble(
        config: &CoordinatorConfig,
        optimizer: Arc<dyn Optimizer>,
        costs: Arc<dyn CostFunctionFactory>,
        sink: Arc<dyn ProgressSink>,
        logger: DynLogger,
    ) -> Self {
        let environment = Arc::new(EnvironmentStore::new());
        let publisher = Arc::new(ProgressPublisher::new(sink, config.emit_pause(), logger.clone()));
        let coordinator = Arc::new(JobCoordinator::new(
            environment.clone(),
            optimizer,
            costs,
            publisher,
            config.settings(),
            logger.clone(),
        ));
        Self::new(environment, coordinator, logger)
    }

    pub fn configure_environment(&self, params: EnvironmentParams) -> ApplicationResult<()> {
        match self.environment.configure(params) {
            Ok(env) => {
                self.logger.info(&format!(
                    "Environment initialized with {} obstacles",
                    env.obstacles.len()
                ));
                Ok(())
            }
            Err(e) => {
                self.logger
                    .error(&format!("Error initializing environment: {}", e));
                Err(e.into())
            }
        }
    }

    pub async fn run_optimization(&self, params: RunParameters) -> ApplicationResult<JobId> {
        self.coordinator.start(params).await.map_err(|e| {
            self.logger.error(&format!("Error starting optimization: {}", e));
            e
        })
    }

    pub async fn stop_optimization(&self) -> StopOutcome {
        self.logger.info("Request to stop current optimization received");
        self.coordinator.stop().await
    }

    pub async fn on_disconnect(&self) -> StopOutcome {
        self.coordinator.on_disconnect().await
    }

    pub async fn on_disconnect_when<F>(&self, unattended: F) -> Option<StopOutcome>
    where
        F: FnOnce() -> bool,
    {
        self.coordinator.on_disconnect_when(unattended).await
    }

    pub async fn status(&self) -> JobStatus {
        self.coordinator.status().await
    }

    pub fn environment(&self) -> Option<Arc<Environment>> {
        self.environment.snapshot()
    }

    pub fn coordinator(&self) -> &Arc<JobCoordinator> {
        &self.coordinator
    }
}
