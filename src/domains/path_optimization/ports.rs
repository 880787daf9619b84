use super::events::OptimizationEvent;
use super::types::{Environment, Position2D, RunParameters};
use crate::common::DomainResult;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// A candidate solution that can be materialized as an ordered path.
pub trait PathSolution: Send + Sync + fmt::Debug {
    fn path(&self) -> Vec<Position2D>;
}

#[derive(Debug, Clone)]
pub struct SolutionDetails {
    pub solution: Arc<dyn PathSolution>,
    pub violations: Option<u32>,
    pub collision_violation_count: Option<u32>,
}

/// A scored candidate as produced by a cost function.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub cost: f64,
    pub details: SolutionDetails,
}

pub trait CostFunction: Send + Sync {
    fn evaluate(&self, position: &[f64]) -> Candidate;
}

/// Builds the cost function for one run from the environment snapshot.
pub trait CostFunctionFactory: Send + Sync {
    fn build(&self, environment: Arc<Environment>, params: &RunParameters) -> Arc<dyn CostFunction>;
}

#[derive(Clone)]
pub struct Problem {
    pub num_var: usize,
    pub var_min: f64,
    pub var_max: f64,
    pub cost_function: Arc<dyn CostFunction>,
}

impl Problem {
    /// Control points are searched in the unit square and scaled by the cost function.
    pub fn unit_box(num_var: usize, cost_function: Arc<dyn CostFunction>) -> Self {
        Self {
            num_var,
            var_min: 0.0,
            var_max: 1.0,
            cost_function,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: usize,
    pub global_best: Candidate,
}

/// Per-iteration callback handed to the optimizer.
///
/// `report` returns `Break` once the job has been cancelled; optimizers are
/// expected to return promptly when they see it.
pub trait IterationSink: Send {
    fn report(&mut self, report: IterationReport) -> ControlFlow<()>;
    fn is_cancelled(&self) -> bool;
}

/// Black-box iterative solver. Runs on a dedicated worker thread.
pub trait Optimizer: Send + Sync {
    fn optimize(
        &self,
        problem: &Problem,
        params: &RunParameters,
        sink: &mut dyn IterationSink,
    ) -> DomainResult<Option<Candidate>>;
}

/// Push channel the publisher delivers events to.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: &OptimizationEvent) -> DomainResult<()>;
}
