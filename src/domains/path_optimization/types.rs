use crate::common::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position2D {
    pub x: f64,
    pub y: f64,
}

impl Position2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position2D) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Position2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub center: Position2D,
    pub radius: f64,
}

/// Workspace a run is evaluated against. Immutable once built; the store
/// swaps whole instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub width: f64,
    pub height: f64,
    pub robot_radius: f64,
    pub start: Position2D,
    pub goal: Position2D,
    pub obstacles: Vec<Obstacle>,
}

impl Environment {
    pub fn contains(&self, position: &Position2D) -> bool {
        position.x >= 0.0
            && position.x <= self.width
            && position.y >= 0.0
            && position.y <= self.height
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObstacleParams {
    pub center: [f64; 2],
    pub radius: f64,
}

/// Body of a configure-environment request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentParams {
    #[serde(default = "default_extent")]
    pub width: f64,
    #[serde(default = "default_extent")]
    pub height: f64,
    #[serde(default = "default_robot_radius")]
    pub robot_radius: f64,
    #[serde(default = "default_start")]
    pub start: [f64; 2],
    #[serde(default = "default_goal")]
    pub goal: [f64; 2],
    #[serde(default)]
    pub obstacles: Vec<ObstacleParams>,
}

fn default_extent() -> f64 {
    100.0
}

fn default_robot_radius() -> f64 {
    1.0
}

fn default_start() -> [f64; 2] {
    [5.0, 5.0]
}

fn default_goal() -> [f64; 2] {
    [95.0, 95.0]
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        Self {
            width: default_extent(),
            height: default_extent(),
            robot_radius: default_robot_radius(),
            start: default_start(),
            goal: default_goal(),
            obstacles: Vec::new(),
        }
    }
}

impl EnvironmentParams {
    pub fn into_environment(self) -> DomainResult<Environment> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(DomainError::validation("width must be a positive number"));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(DomainError::validation("height must be a positive number"));
        }
        if !(self.robot_radius.is_finite() && self.robot_radius >= 0.0) {
            return Err(DomainError::validation(
                "robotRadius must be a non-negative number",
            ));
        }

        let mut environment = Environment {
            width: self.width,
            height: self.height,
            robot_radius: self.robot_radius,
            start: self.start.into(),
            goal: self.goal.into(),
            obstacles: Vec::with_capacity(self.obstacles.len()),
        };

        if !environment.start.is_finite() || !environment.contains(&environment.start) {
            return Err(DomainError::validation(format!(
                "start ({}, {}) lies outside the {}x{} workspace",
                environment.start.x, environment.start.y, self.width, self.height
            )));
        }
        if !environment.goal.is_finite() || !environment.contains(&environment.goal) {
            return Err(DomainError::validation(format!(
                "goal ({}, {}) lies outside the {}x{} workspace",
                environment.goal.x, environment.goal.y, self.width, self.height
            )));
        }

        for (index, obstacle) in self.obstacles.into_iter().enumerate() {
            let center = Position2D::from(obstacle.center);
            if !center.is_finite() {
                return Err(DomainError::validation(format!(
                    "obstacle {} has a non-finite center",
                    index
                )));
            }
            if !(obstacle.radius.is_finite() && obstacle.radius > 0.0) {
                return Err(DomainError::validation(format!(
                    "obstacle {} must have a positive radius",
                    index
                )));
            }
            environment.obstacles.push(Obstacle {
                center,
                radius: obstacle.radius,
            });
        }

        Ok(environment)
    }
}

/// Solver tuning plus problem shaping values for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunParameters {
    pub max_iter: usize,
    pub pop_size: usize,
    pub c1: f64,
    pub c2: f64,
    pub w: f64,
    pub wdamp: f64,
    pub resetting: usize,
    pub num_control_points: usize,
    pub resolution: usize,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            max_iter: 100,
            pop_size: 100,
            c1: 2.0,
            c2: 1.0,
            w: 0.8,
            wdamp: 1.0,
            resetting: 25,
            num_control_points: 3,
            resolution: 50,
        }
    }
}

/// Upper bounds accepted from a request. The worker allocates per
/// iteration in proportion to `pop_size * resolution`, so unbounded values
/// could exhaust memory before cancellation is ever checked.
pub const MAX_ITERATIONS: usize = 100_000;
pub const MAX_POPULATION: usize = 10_000;
pub const MAX_CONTROL_POINTS: usize = 256;
pub const MAX_RESOLUTION: usize = 10_000;

impl RunParameters {
    pub fn validate(&self) -> DomainResult<()> {
        let counts = [
            ("maxIter", self.max_iter, 1, MAX_ITERATIONS),
            ("popSize", self.pop_size, 1, MAX_POPULATION),
            ("numControlPoints", self.num_control_points, 1, MAX_CONTROL_POINTS),
            ("resolution", self.resolution, 2, MAX_RESOLUTION),
        ];
        for (name, value, min, max) in counts {
            if value < min || value > max {
                return Err(DomainError::validation(format!(
                    "{} must be between {} and {}, got {}",
                    name, min, max, value
                )));
            }
        }
        let coefficients = [("c1", self.c1), ("c2", self.c2), ("w", self.w), ("wdamp", self.wdamp)];
        if let Some((name, _)) = coefficients.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DomainError::validation(format!("{} must be finite", name)));
        }
        Ok(())
    }

    /// Decision variables: one (x, y) pair per control point.
    pub fn num_var(&self) -> DomainResult<usize> {
        self.num_control_points
            .checked_mul(2)
            .ok_or_else(|| DomainError::validation("numControlPoints is too large"))
    }
}
