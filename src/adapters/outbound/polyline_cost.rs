use crate::domains::path_optimization::{
    path_length, Candidate, CostFunction, CostFunctionFactory, Environment, PathSolution,
    Position2D, RunParameters, SolutionDetails,
};
use std::sync::Arc;

/// Piecewise-linear path through start, control points and goal, sampled at
/// evenly spaced arc-length positions.
#[derive(Debug, Clone)]
pub struct PolylinePath {
    samples: Vec<Position2D>,
}

impl PathSolution for PolylinePath {
    fn path(&self) -> Vec<Position2D> {
        self.samples.clone()
    }
}

/// Scores a decision vector as path length inflated by obstacle penetration.
///
/// The vector holds one normalized `(x, y)` pair per control point; pairs are
/// scaled by the workspace extent.
pub struct PolylineCost {
    environment: Arc<Environment>,
    num_control_points: usize,
    resolution: usize,
    penalty: f64,
}

impl PolylineCost {
    pub fn new(
        environment: Arc<Environment>,
        num_control_points: usize,
        resolution: usize,
        penalty: f64,
    ) -> Self {
        Self {
            environment,
            num_control_points,
            resolution: resolution.max(2),
            penalty,
        }
    }

    fn anchors(&self, position: &[f64]) -> Vec<Position2D> {
        let env = &self.environment;
        let mut anchors = Vec::with_capacity(self.num_control_points + 2);
        anchors.push(env.start);
        anchors.extend(
            position
                .chunks_exact(2)
                .take(self.num_control_points)
                .map(|pair| Position2D::new(pair[0] * env.width, pair[1] * env.height)),
        );
        anchors.push(env.goal);
        anchors
    }

    fn resample(&self, anchors: &[Position2D]) -> Vec<Position2D> {
        let total = path_length(anchors);
        if total == 0.0 {
            return vec![anchors[0]; self.resolution];
        }

        let step = total / (self.resolution - 1) as f64;
        let mut samples = Vec::with_capacity(self.resolution);
        let mut segment = 0;
        let mut walked = 0.0;
        for i in 0..self.resolution {
            let target = (step * i as f64).min(total);
            while segment + 1 < anchors.len() - 1
                && walked + anchors[segment].distance_to(&anchors[segment + 1]) < target
            {
                walked += anchors[segment].distance_to(&anchors[segment + 1]);
                segment += 1;
            }
            let (a, b) = (anchors[segment], anchors[segment + 1]);
            let seg_len = a.distance_to(&b);
            let t = if seg_len > 0.0 {
                ((target - walked) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            samples.push(Position2D::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)));
        }
        samples
    }
}

impl CostFunction for PolylineCost {
    fn evaluate(&self, position: &[f64]) -> Candidate {
        let samples = self.resample(&self.anchors(position));
        let env = &self.environment;

        let mut penetration = 0.0;
        let mut violations = 0u32;
        let mut collisions = 0u32;
        for sample in &samples {
            let mut in_collision = false;
            for obstacle in &env.obstacles {
                let clearance = obstacle.radius + env.robot_radius;
                let distance = sample.distance_to(&obstacle.center);
                if distance < clearance {
                    penetration += 1.0 - distance / clearance;
                    in_collision = true;
                }
            }
            if in_collision {
                collisions += 1;
            }
            if in_collision || !env.contains(sample) {
                violations += 1;
            }
        }

        let violation = penetration / samples.len() as f64;
        let cost = path_length(&samples) * (1.0 + self.penalty * violation);
        Candidate {
            cost,
            details: SolutionDetails {
                solution: Arc::new(PolylinePath { samples }),
                violations: Some(violations),
                collision_violation_count: Some(collisions),
            },
        }
    }
}

pub struct PolylineCostFactory {
    pub penalty: f64,
}

impl Default for PolylineCostFactory {
    fn default() -> Self {
        Self { penalty: 100.0 }
    }
}

impl CostFunctionFactory for PolylineCostFactory {
    fn build(&self, environment: Arc<Environment>, params: &RunParameters) -> Arc<dyn CostFunction> {
        Arc::new(PolylineCost::new(
            environment,
            params.num_control_points,
            params.resolution,
            self.penalty,
        ))
    }
}
