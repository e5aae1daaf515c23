//! Operation options
//!
//! Every numerical operation takes one of these option structs. They are
//! plain serde data so they can cross the execution-context boundary and the
//! remote backend's HTTP boundary unchanged. Each carries an optional seed;
//! with a seed the operation is fully deterministic.

use serde::{Deserialize, Serialize};

/// Options for Bézier curve path generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveOptions {
    /// Number of points to sample along the curve (must be >= 2)
    pub num_points: usize,
    /// Curvature complexity in [0, 1]; scales control point influence and arc offset
    pub complexity: f64,
    /// Overshoot past the target; 0 disables overshoot
    pub overshoot_factor: f64,
    /// Control point jitter multiplier
    pub jitter_amount: f64,
    pub seed: Option<u64>,
}

impl Default for CurveOptions {
    fn default() -> Self {
        Self {
            num_points: 100,
            complexity: 0.5,
            overshoot_factor: 0.2,
            jitter_amount: 1.0,
            seed: None,
        }
    }
}

impl CurveOptions {
    pub fn with_num_points(mut self, num_points: usize) -> Self {
        self.num_points = num_points;
        self
    }

    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = complexity.clamp(0.0, 1.0);
        self
    }

    pub fn with_overshoot(mut self, overshoot_factor: f64) -> Self {
        self.overshoot_factor = overshoot_factor.max(0.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Options for minimum-jerk trajectory generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryOptions {
    pub num_points: usize,
    /// Split the movement into an overshooting primary phase and a corrective phase
    pub two_phase: bool,
    pub overshoot_factor: f64,
    pub seed: Option<u64>,
}

impl Default for TrajectoryOptions {
    fn default() -> Self {
        Self {
            num_points: 100,
            two_phase: false,
            overshoot_factor: 0.0,
            seed: None,
        }
    }
}

impl TrajectoryOptions {
    pub fn with_num_points(mut self, num_points: usize) -> Self {
        self.num_points = num_points;
        self
    }

    pub fn two_phase(mut self, overshoot_factor: f64) -> Self {
        self.two_phase = true;
        self.overshoot_factor = overshoot_factor.max(0.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Options for the damped-spring physics simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsOptions {
    pub mass: f64,
    pub spring_constant: f64,
    pub damping_factor: f64,
    pub time_step: f64,
    pub max_steps: usize,
    pub stopping_threshold: f64,
    /// Use distance-dependent spring stiffness and speed-dependent damping
    pub nonlinear: bool,
    #[serde(rename = "randomSeed")]
    pub seed: Option<u64>,
}

impl Default for PhysicsOptions {
    fn default() -> Self {
        Self {
            mass: 1.0,
            spring_constant: 8.0,
            damping_factor: 0.7,
            time_step: 0.016,
            max_steps: 1000,
            stopping_threshold: 0.1,
            nonlinear: false,
            seed: None,
        }
    }
}

impl PhysicsOptions {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn nonlinear(mut self) -> Self {
        self.nonlinear = true;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Position-dependent modulation of the jitter process
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionDependence {
    /// How much the reversion rate grows near the endpoints
    pub theta_scale: f64,
    /// How much the noise magnitude swells mid-path
    pub sigma_scale: f64,
}

impl Default for PositionDependence {
    fn default() -> Self {
        Self {
            theta_scale: 0.5,
            sigma_scale: 0.3,
        }
    }
}

/// Options for Ornstein-Uhlenbeck stochastic jitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterOptions {
    pub points: usize,
    /// Mean reversion rate
    pub theta: f64,
    /// Noise magnitude
    pub sigma: f64,
    pub dt: f64,
    pub position_dependence: Option<PositionDependence>,
    pub seed: Option<u64>,
}

impl Default for JitterOptions {
    fn default() -> Self {
        Self {
            points: 100,
            theta: 0.7,
            sigma: 0.5,
            dt: 0.1,
            position_dependence: None,
            seed: None,
        }
    }
}

impl JitterOptions {
    pub fn with_points(mut self, points: usize) -> Self {
        self.points = points;
        self
    }

    pub fn position_dependent(mut self, dependence: PositionDependence) -> Self {
        self.position_dependence = Some(dependence);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Timing law used to reparameterize a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityProfile {
    /// Constant speed along the path
    Uniform,
    /// Slow start, fast middle, slow end
    #[default]
    MinimumJerk,
    /// Fast acceleration, slower deceleration
    Asymmetric,
    Sigmoid,
}

impl VelocityProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::MinimumJerk => "minimum_jerk",
            Self::Asymmetric => "asymmetric",
            Self::Sigmoid => "sigmoid",
        }
    }
}

impl std::fmt::Display for VelocityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for reparameterizing an existing path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityProfileOptions {
    pub profile: VelocityProfile,
    /// Number of points in the output path (must be >= 2)
    pub num_points: usize,
}

impl Default for VelocityProfileOptions {
    fn default() -> Self {
        Self {
            profile: VelocityProfile::default(),
            num_points: 100,
        }
    }
}

impl VelocityProfileOptions {
    pub fn new(profile: VelocityProfile, num_points: usize) -> Self {
        Self {
            profile,
            num_points,
        }
    }
}

/// A start/end operation that can run per item or in batches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionOperation {
    Curve(CurveOptions),
    Trajectory(TrajectoryOptions),
    Physics(PhysicsOptions),
}

impl MotionOperation {
    /// Operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Curve(_) => "curve",
            Self::Trajectory(_) => "trajectory",
            Self::Physics(_) => "physics",
        }
    }

    pub fn seed(&self) -> Option<u64> {
        match self {
            Self::Curve(o) => o.seed,
            Self::Trajectory(o) => o.seed,
            Self::Physics(o) => o.seed,
        }
    }

    /// Same operation with the seed replaced
    pub fn with_seed(&self, seed: u64) -> Self {
        let mut op = self.clone();
        match &mut op {
            Self::Curve(o) => o.seed = Some(seed),
            Self::Trajectory(o) => o.seed = Some(seed),
            Self::Physics(o) => o.seed = Some(seed),
        }
        op
    }
}
