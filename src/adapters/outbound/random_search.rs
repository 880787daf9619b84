use crate::common::{DomainError, DomainResult};
use crate::domains::path_optimization::{
    Candidate, IterationReport, IterationSink, Optimizer, Problem, RunParameters,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reference optimizer: samples `pop_size` uniform vectors per iteration and
/// keeps the best seen so far. Stands in for a real solver so the service can
/// run end to end; it makes no attempt at a clever search.
#[derive(Debug, Default, Clone)]
pub struct RandomSearchOptimizer {
    seed: Option<u64>,
}

impl RandomSearchOptimizer {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl Optimizer for RandomSearchOptimizer {
    fn optimize(
        &self,
        problem: &Problem,
        params: &RunParameters,
        sink: &mut dyn IterationSink,
    ) -> DomainResult<Option<Candidate>> {
        if !(problem.var_min <= problem.var_max) {
            return Err(DomainError::OptimizerRuntime(format!(
                "empty search box [{}, {}]",
                problem.var_min, problem.var_max
            )));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut best: Option<Candidate> = None;

        for iteration in 0..params.max_iter {
            if sink.is_cancelled() {
                break;
            }
            for _ in 0..params.pop_size {
                let position: Vec<f64> = (0..problem.num_var)
                    .map(|_| rng.gen_range(problem.var_min..=problem.var_max))
                    .collect();
                let candidate = problem.cost_function.evaluate(&position);
                if !candidate.cost.is_finite() {
                    continue;
                }
                if best.as_ref().map_or(true, |b| candidate.cost < b.cost) {
                    best = Some(candidate);
                }
            }

            let Some(global_best) = best.clone() else {
                continue;
            };
            if sink
                .report(IterationReport {
                    iteration,
                    global_best,
                })
                .is_break()
            {
                break;
            }
        }

        // A cancelled run has no result to hand back.
        if sink.is_cancelled() {
            return Ok(None);
        }
        Ok(best)
    }
}
