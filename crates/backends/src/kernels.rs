//! Reference numerical kernels
//!
//! Plain synchronous functions shared by every backend. The reference backend
//! wraps them directly, the native backend fans them out over a rayon pool,
//! the remote backend falls back to them, and worker tasks call them inside
//! execution contexts.
//!
//! Every entry point validates its inputs and returns
//! [`BackendError::InvalidInput`] instead of panicking. With a seed the output
//! is fully deterministic.

use motionpool_core::{
    item_seed, CurveOptions, JitterOptions, JitterSeries, MotionOperation, Path, PhysicsOptions,
    Point, TrajectoryOptions, VelocityProfile, VelocityProfileOptions,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::backend::{BackendError, Result};

/// Share of the points spent on the primary phase of a two-phase trajectory
const PRIMARY_PHASE_SHARE: f64 = 0.7;

// Non-linear spring parameters
const NONLINEAR_K0: f64 = 1.0;
const NONLINEAR_K1: f64 = 5.0;
const NONLINEAR_SPEED_FACTOR: f64 = 0.5;

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Normal sample with mean 0; degenerate deviations yield 0
fn gaussian(rng: &mut StdRng, std_dev: f64) -> f64 {
    if !(std_dev.is_finite() && std_dev > 0.0) {
        return 0.0;
    }
    match Normal::new(0.0, std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => 0.0,
    }
}

fn standard_normal(rng: &mut StdRng) -> f64 {
    gaussian(rng, 1.0)
}

pub(crate) fn check_point(name: &str, p: Point) -> Result<()> {
    if p.x.is_finite() && p.y.is_finite() {
        Ok(())
    } else {
        Err(BackendError::invalid(format!(
            "{} must have finite coordinates, got ({}, {})",
            name, p.x, p.y
        )))
    }
}

pub(crate) fn check_num_points(num_points: usize) -> Result<()> {
    if num_points < 2 {
        return Err(BackendError::invalid(format!(
            "at least 2 points are required, got {}",
            num_points
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BackendError::invalid(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

// ============================================================================
// Bézier curves
// ============================================================================

/// Sample a cubic Bézier curve at `num_points` evenly spaced parameters
pub fn bezier_curve(p0: Point, p1: Point, p2: Point, p3: Point, num_points: usize) -> Result<Path> {
    check_num_points(num_points)?;
    for (name, p) in [("p0", p0), ("p1", p1), ("p2", p2), ("p3", p3)] {
        check_point(name, p)?;
    }

    let last = (num_points - 1) as f64;
    let path = (0..num_points)
        .map(|i| {
            let t = i as f64 / last;
            let mt = 1.0 - t;
            let a = mt * mt * mt;
            let b = 3.0 * mt * mt * t;
            let c = 3.0 * mt * t * t;
            let d = t * t * t;
            Point::new(
                a * p0.x + b * p1.x + c * p2.x + d * p3.x,
                a * p0.y + b * p1.y + c * p2.y + d * p3.y,
            )
        })
        .collect();
    Ok(path)
}

/// Compute the two inner control points of a natural-looking curve
///
/// Separate from [`generate_curve`] so the remote backend can ship the
/// control points and let the service sample the curve.
pub fn curve_control_points(
    start: Point,
    end: Point,
    options: &CurveOptions,
) -> Result<(Point, Point)> {
    check_point("start", start)?;
    check_point("end", end)?;

    let mut rng = rng_for(options.seed);
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let distance = start.distance_to(&end);
    let complexity = options.complexity;

    let base_influence = (distance / 1000.0).clamp(0.2, 0.5) * (0.5 + complexity * 0.5);
    let influence1 = base_influence * (0.8 + 0.4 * rng.gen::<f64>());
    let influence2 = base_influence * (0.8 + 0.4 * rng.gen::<f64>());

    let jitter_scale = (distance * 0.2).min(50.0) * options.jitter_amount * 0.1;
    let jx1 = gaussian(&mut rng, jitter_scale);
    let jy1 = gaussian(&mut rng, jitter_scale);
    let jx2 = gaussian(&mut rng, jitter_scale);
    let jy2 = gaussian(&mut rng, jitter_scale);

    // Arc offset perpendicular to the straight line
    let perp_magnitude = complexity * 0.5 * (rng.gen::<f64>() - 0.5);
    let perp_x = -dy * perp_magnitude;
    let perp_y = dx * perp_magnitude;

    let cp1 = Point::new(
        start.x + dx * influence1 + perp_x + jx1,
        start.y + dy * influence1 + perp_y + jy1,
    );
    let mut cp2 = Point::new(
        end.x - dx * influence2 - perp_x + jx2,
        end.y - dy * influence2 - perp_y + jy2,
    );

    if options.overshoot_factor > 0.0 && distance > 100.0 {
        let amount = options.overshoot_factor * (0.1 + 0.1 * rng.gen::<f64>());
        cp2 = Point::new(end.x + dx * amount, end.y + dy * amount);
    }

    Ok((cp1, cp2))
}

/// Bézier path from `start` to `end`
pub fn generate_curve(start: Point, end: Point, options: &CurveOptions) -> Result<Path> {
    check_num_points(options.num_points)?;
    let (cp1, cp2) = curve_control_points(start, end, options)?;
    bezier_curve(start, cp1, cp2, end, options.num_points)
}

// ============================================================================
// Minimum-jerk trajectories
// ============================================================================

/// Minimum-jerk interpolation `x0 + (x1 - x0)(10t³ - 15t⁴ + 6t⁵)`
pub fn minimum_jerk(start: Point, end: Point, num_points: usize) -> Result<Path> {
    check_num_points(num_points)?;
    check_point("start", start)?;
    check_point("end", end)?;

    let last = (num_points - 1) as f64;
    let path = (0..num_points)
        .map(|i| {
            let t = i as f64 / last;
            let s = t * t * t * (10.0 - 15.0 * t + 6.0 * t * t);
            Point::new(
                start.x + (end.x - start.x) * s,
                start.y + (end.y - start.y) * s,
            )
        })
        .collect();
    Ok(path)
}

/// Minimum-jerk trajectory, optionally split into an overshooting primary
/// phase and a corrective phase
pub fn generate_trajectory(start: Point, end: Point, options: &TrajectoryOptions) -> Result<Path> {
    let n = options.num_points;
    check_num_points(n)?;

    if !options.two_phase || options.overshoot_factor <= 0.0 || n < 3 {
        return minimum_jerk(start, end, n);
    }
    check_point("start", start)?;
    check_point("end", end)?;

    let mut rng = rng_for(options.seed);
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let distance = start.distance_to(&end);

    let overshoot_scale = (distance * 0.001).min(0.3) * options.overshoot_factor;
    let intermediate = Point::new(
        end.x + gaussian(&mut rng, overshoot_scale * dx.abs()),
        end.y + gaussian(&mut rng, overshoot_scale * dy.abs()),
    );

    // Junction point is shared, so the phases together yield exactly n points
    let primary = ((n as f64 * PRIMARY_PHASE_SHARE) as usize).max(2);
    let corrective = n - primary + 1;

    let mut path = minimum_jerk(start, intermediate, primary)?;
    let tail = minimum_jerk(intermediate, end, corrective)?;
    path.extend(tail.into_iter().skip(1));
    Ok(path)
}

// ============================================================================
// Physics simulation
// ============================================================================

pub(crate) fn validate_physics(start: Point, end: Point, options: &PhysicsOptions) -> Result<()> {
    check_point("start", start)?;
    check_point("end", end)?;
    check_positive("mass", options.mass)?;
    check_positive("time_step", options.time_step)?;
    if !(options.stopping_threshold.is_finite() && options.stopping_threshold >= 0.0) {
        return Err(BackendError::invalid(format!(
            "stopping_threshold must be non-negative, got {}",
            options.stopping_threshold
        )));
    }
    Ok(())
}

/// Damped-spring simulation from `start` towards `end`
///
/// The returned path starts at `start` and has one point per simulated step.
/// The simulation stops once both the remaining distance and the speed fall
/// under the stopping threshold, or after `max_steps`.
pub fn simulate_movement(start: Point, end: Point, options: &PhysicsOptions) -> Result<Path> {
    validate_physics(start, end, options)?;

    let mut rng = rng_for(options.seed);
    let noise_magnitude = 0.01 * options.stopping_threshold;
    let dt = options.time_step;

    let mut path = Vec::with_capacity(options.max_steps.min(4096) + 1);
    path.push(start);

    let (mut px, mut py) = (start.x, start.y);
    let (mut vx, mut vy) = (0.0_f64, 0.0_f64);

    for _ in 0..options.max_steps {
        let dx = end.x - px;
        let dy = end.y - py;
        let distance = (dx * dx + dy * dy).sqrt();
        let speed = (vx * vx + vy * vy).sqrt();

        let (spring, damping) = if options.nonlinear {
            (
                options.spring_constant * (NONLINEAR_K0 + NONLINEAR_K1 / (distance + 1.0)),
                options.damping_factor * (1.0 + NONLINEAR_SPEED_FACTOR * speed),
            )
        } else {
            (options.spring_constant, options.damping_factor)
        };

        let noise_x = gaussian(&mut rng, noise_magnitude);
        let noise_y = gaussian(&mut rng, noise_magnitude);

        let ax = (spring * dx - damping * vx + noise_x) / options.mass;
        let ay = (spring * dy - damping * vy + noise_y) / options.mass;

        vx += ax * dt;
        vy += ay * dt;
        px += vx * dt;
        py += vy * dt;
        path.push(Point::new(px, py));

        // The linear model checks the post-step speed, the non-linear one the pre-step speed
        let speed_after = (vx * vx + vy * vy).sqrt();
        let settled_speed = if options.nonlinear { speed } else { speed_after };
        if distance < options.stopping_threshold && settled_speed < options.stopping_threshold {
            break;
        }
    }

    Ok(path)
}

// ============================================================================
// Ornstein-Uhlenbeck jitter
// ============================================================================

pub(crate) fn validate_jitter(options: &JitterOptions) -> Result<()> {
    check_num_points(options.points)?;
    check_positive("dt", options.dt)?;
    for (name, value) in [("theta", options.theta), ("sigma", options.sigma)] {
        if !value.is_finite() {
            return Err(BackendError::invalid(format!("{} must be finite", name)));
        }
    }
    Ok(())
}

/// Mean-reverting jitter series in x and y, both starting at 0
pub fn generate_jitter(options: &JitterOptions) -> Result<JitterSeries> {
    validate_jitter(options)?;

    let n = options.points;
    let mut rng = rng_for(options.seed);
    let sqrt_dt = options.dt.sqrt();
    let mut jitter_x = vec![0.0; n];
    let mut jitter_y = vec![0.0; n];

    for i in 1..n {
        let (theta, sigma) = match options.position_dependence {
            None => (options.theta, options.sigma),
            Some(dep) => {
                let pos = i as f64 / (n - 1) as f64;
                let endpoint_proximity = pos.min(1.0 - pos);
                (
                    options.theta + dep.theta_scale / (endpoint_proximity + 0.1),
                    options.sigma
                        * (1.0 + dep.sigma_scale * (std::f64::consts::PI * pos).sin().powi(2)),
                )
            }
        };
        let reversion = 1.0 - theta * options.dt;
        jitter_x[i] = jitter_x[i - 1] * reversion + sigma * sqrt_dt * standard_normal(&mut rng);
        jitter_y[i] = jitter_y[i - 1] * reversion + sigma * sqrt_dt * standard_normal(&mut rng);
    }

    Ok(JitterSeries { jitter_x, jitter_y })
}

// ============================================================================
// Velocity profiles
// ============================================================================

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

fn check_path(path: &[Point]) -> Result<()> {
    if path.is_empty() {
        return Err(BackendError::invalid("path must not be empty"));
    }
    for (i, p) in path.iter().enumerate() {
        check_point(&format!("path[{}]", i), *p)?;
    }
    Ok(())
}

/// Resample `path` to `num_points` points evenly spaced by arc length
///
/// Both endpoints are kept. A single-point path is repeated.
pub fn resample_path(path: &[Point], num_points: usize) -> Result<Path> {
    check_num_points(num_points)?;
    check_path(path)?;

    let (first, last) = (path[0], path[path.len() - 1]);
    if path.len() == 1 {
        return Ok(vec![first; num_points]);
    }

    let mut cumulative = Vec::with_capacity(path.len());
    cumulative.push(0.0);
    for w in path.windows(2) {
        let prev = cumulative[cumulative.len() - 1];
        cumulative.push(prev + w[0].distance_to(&w[1]));
    }
    let total = cumulative[cumulative.len() - 1];

    let mut resampled = Vec::with_capacity(num_points);
    resampled.push(first);
    let mut segment = 0;
    for i in 1..num_points - 1 {
        let target = i as f64 / (num_points - 1) as f64 * total;
        while segment < path.len() - 2 && cumulative[segment + 1] < target {
            segment += 1;
        }
        let length = cumulative[segment + 1] - cumulative[segment];
        let fraction = if length > 0.0 {
            ((target - cumulative[segment]) / length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        resampled.push(lerp(path[segment], path[segment + 1], fraction));
    }
    resampled.push(last);
    Ok(resampled)
}

/// Progress along the path at normalized time `t`
fn profile_progress(profile: VelocityProfile, t: f64) -> f64 {
    match profile {
        VelocityProfile::Uniform => t,
        VelocityProfile::MinimumJerk => t * t * t * (10.0 - 15.0 * t + 6.0 * t * t),
        VelocityProfile::Asymmetric => {
            let rise = t.powf(1.8);
            rise / (rise + (1.0 - t).powf(2.2))
        }
        VelocityProfile::Sigmoid => 1.0 / (1.0 + (-12.0 * (t - 0.5)).exp()),
    }
}

/// Reparameterize `path` so that equal time steps follow `options.profile`
///
/// The path is first resampled by arc length, then sampled at the profile's
/// progress values. The result has exactly `options.num_points` points and
/// keeps both endpoints.
pub fn apply_velocity_profile(path: &[Point], options: &VelocityProfileOptions) -> Result<Path> {
    let n = options.num_points;
    check_num_points(n)?;
    check_path(path)?;

    if options.profile == VelocityProfile::Uniform {
        return if path.len() == n {
            Ok(path.to_vec())
        } else {
            resample_path(path, n)
        };
    }

    let uniform = resample_path(path, n)?;
    let last = uniform.len() - 1;
    let profiled = (0..n)
        .map(|i| {
            if i == 0 {
                return uniform[0];
            }
            if i == n - 1 {
                return uniform[last];
            }
            let t = i as f64 / (n - 1) as f64;
            let position = profile_progress(options.profile, t) * last as f64;
            let index = position.floor() as usize;
            if index >= last {
                uniform[last]
            } else {
                lerp(uniform[index], uniform[index + 1], position - index as f64)
            }
        })
        .collect();
    Ok(profiled)
}

// ============================================================================
// Operation dispatch
// ============================================================================

/// Run a start/end operation with the reference kernels
pub fn run_operation(operation: &MotionOperation, start: Point, end: Point) -> Result<Path> {
    match operation {
        MotionOperation::Curve(o) => generate_curve(start, end, o),
        MotionOperation::Trajectory(o) => generate_trajectory(start, end, o),
        MotionOperation::Physics(o) => simulate_movement(start, end, o),
    }
}

/// Run one batch item
///
/// An operation with an explicit seed runs unchanged, so every item equals
/// the single-item call with the same options. Without one, item `index`
/// draws its seed from the batch seed.
pub fn run_item(
    operation: &MotionOperation,
    start: Point,
    end: Point,
    batch_seed: u64,
    index: usize,
) -> Result<Path> {
    match operation.seed() {
        Some(_) => run_operation(operation, start, end),
        None => run_operation(&operation.with_seed(item_seed(batch_seed, index)), start, end),
    }
}

/// Sequentially run a slice of a batch whose first item has global index `offset`
pub fn run_sequential(
    operation: &MotionOperation,
    starts: &[Point],
    ends: &[Point],
    batch_seed: u64,
    offset: usize,
) -> Result<Vec<Path>> {
    if starts.len() != ends.len() {
        return Err(BackendError::invalid(format!(
            "start and end lengths differ ({} vs {})",
            starts.len(),
            ends.len()
        )));
    }
    starts
        .iter()
        .zip(ends)
        .enumerate()
        .map(|(i, (s, e))| run_item(operation, *s, *e, batch_seed, offset + i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use motionpool_core::PositionDependence;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_bezier_endpoints() {
        let path = bezier_curve(p(0.0, 0.0), p(10.0, 50.0), p(90.0, 50.0), p(100.0, 0.0), 11)
            .unwrap();
        assert_eq!(path.len(), 11);
        assert_eq!(path[0], p(0.0, 0.0));
        assert_eq!(path[10], p(100.0, 0.0));
    }

    #[test]
    fn test_too_few_points_is_an_error() {
        let options = CurveOptions::default().with_num_points(1);
        let err = generate_curve(p(0.0, 0.0), p(10.0, 10.0), &options).unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));

        let jitter = JitterOptions::default().with_points(0);
        assert!(generate_jitter(&jitter).is_err());
    }

    #[test]
    fn test_non_finite_input_is_an_error() {
        let err = minimum_jerk(p(f64::NAN, 0.0), p(1.0, 1.0), 10).unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));
    }

    #[test]
    fn test_seeded_curve_is_reproducible() {
        let options = CurveOptions::default().with_seed(12345);
        let a = generate_curve(p(0.0, 0.0), p(500.0, 300.0), &options).unwrap();
        let b = generate_curve(p(0.0, 0.0), p(500.0, 300.0), &options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.first(), Some(&p(0.0, 0.0)));
        assert_eq!(a.last(), Some(&p(500.0, 300.0)));
    }

    #[test]
    fn test_minimum_jerk_is_monotonic_on_a_line() {
        let path = minimum_jerk(p(0.0, 0.0), p(100.0, 0.0), 50).unwrap();
        assert!(path.windows(2).all(|w| w[1].x >= w[0].x));
        assert!((path[25].x - 50.0).abs() < 5.0);
    }

    #[test]
    fn test_two_phase_trajectory_keeps_point_count() {
        let options = TrajectoryOptions::default()
            .with_num_points(40)
            .two_phase(1.0)
            .with_seed(7);
        let path = generate_trajectory(p(0.0, 0.0), p(800.0, 200.0), &options).unwrap();
        assert_eq!(path.len(), 40);
        assert_eq!(path[0], p(0.0, 0.0));
        let last = path[39];
        assert!((last.x - 800.0).abs() < 1e-9 && (last.y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_physics_settles_near_target() {
        let options = PhysicsOptions::default().with_seed(3);
        let path = simulate_movement(p(0.0, 0.0), p(100.0, 100.0), &options).unwrap();
        assert_eq!(path[0], p(0.0, 0.0));
        assert!(path.len() <= options.max_steps + 1);
        let last = path[path.len() - 1];
        assert!(last.distance_to(&p(100.0, 100.0)) < 5.0);
    }

    #[test]
    fn test_nonlinear_physics_runs() {
        let options = PhysicsOptions::default().nonlinear().with_max_steps(200).with_seed(1);
        let path = simulate_movement(p(0.0, 0.0), p(50.0, 0.0), &options).unwrap();
        assert!(path.len() > 1 && path.len() <= 201);
    }

    #[test]
    fn test_physics_rejects_zero_mass() {
        let options = PhysicsOptions {
            mass: 0.0,
            ..Default::default()
        };
        assert!(simulate_movement(p(0.0, 0.0), p(1.0, 1.0), &options).is_err());
    }

    #[test]
    fn test_jitter_series_shape() {
        let options = JitterOptions::default().with_points(64).with_seed(11);
        let series = generate_jitter(&options).unwrap();
        assert_eq!(series.len(), 64);
        assert_eq!(series.jitter_y.len(), 64);
        assert_eq!(series.jitter_x[0], 0.0);
        assert_eq!(series, generate_jitter(&options).unwrap());

        let dependent = options.position_dependent(PositionDependence::default());
        let series = generate_jitter(&dependent).unwrap();
        assert!(series.jitter_x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_run_sequential_matches_items() {
        let op = MotionOperation::Curve(CurveOptions::default().with_num_points(20));
        let starts = vec![p(0.0, 0.0), p(10.0, 10.0), p(20.0, 5.0)];
        let ends = vec![p(300.0, 100.0), p(50.0, 400.0), p(700.0, 700.0)];

        let all = run_sequential(&op, &starts, &ends, 42, 0).unwrap();
        let tail = run_sequential(&op, &starts[1..], &ends[1..], 42, 1).unwrap();
        assert_eq!(&all[1..], &tail[..]);
        assert_eq!(all[2], run_item(&op, starts[2], ends[2], 42, 2).unwrap());
        assert_ne!(all[0], run_item(&op, starts[0], ends[0], 43, 0).unwrap());
    }

    #[test]
    fn test_explicit_seed_runs_every_item_unchanged() {
        let op = MotionOperation::Curve(CurveOptions::default().with_num_points(20).with_seed(12345));
        let starts = vec![p(0.0, 0.0), p(10.0, 10.0), p(20.0, 5.0)];
        let ends = vec![p(300.0, 100.0), p(50.0, 400.0), p(700.0, 700.0)];

        // The batch seed only matters for unseeded operations
        let batch = run_sequential(&op, &starts, &ends, 999, 7).unwrap();
        for i in 0..3 {
            assert_eq!(batch[i], run_operation(&op, starts[i], ends[i]).unwrap());
        }
    }

    #[test]
    fn test_resample_spaces_points_by_arc_length() {
        // An L-shaped path of total length 20
        let path = vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0)];
        let resampled = resample_path(&path, 5).unwrap();

        assert_eq!(resampled.len(), 5);
        assert_eq!(resampled[0], p(0.0, 0.0));
        assert_eq!(resampled[1], p(5.0, 0.0));
        assert_eq!(resampled[2], p(10.0, 0.0));
        assert_eq!(resampled[3], p(10.0, 5.0));
        assert_eq!(resampled[4], p(10.0, 10.0));
    }

    #[test]
    fn test_resample_edge_cases() {
        assert_eq!(resample_path(&[p(3.0, 4.0)], 3).unwrap(), vec![p(3.0, 4.0); 3]);
        assert!(resample_path(&[], 3).is_err());
        assert!(resample_path(&[p(0.0, 0.0), p(1.0, 1.0)], 1).is_err());
        assert!(resample_path(&[p(0.0, 0.0), p(f64::NAN, 1.0)], 4).is_err());

        // Repeated points give zero-length segments
        let stalled = resample_path(&[p(0.0, 0.0), p(0.0, 0.0), p(4.0, 0.0)], 3).unwrap();
        assert_eq!(stalled, vec![p(0.0, 0.0), p(2.0, 0.0), p(4.0, 0.0)]);
    }

    #[test]
    fn test_uniform_profile_keeps_matching_path() {
        let path = vec![p(0.0, 0.0), p(1.0, 7.0), p(2.0, 3.0)];
        let options = VelocityProfileOptions::new(VelocityProfile::Uniform, 3);
        assert_eq!(apply_velocity_profile(&path, &options).unwrap(), path);

        let options = VelocityProfileOptions::new(VelocityProfile::Uniform, 9);
        assert_eq!(apply_velocity_profile(&path, &options).unwrap().len(), 9);
    }

    #[test]
    fn test_minimum_jerk_profile_is_slow_at_the_ends() {
        let path = vec![p(0.0, 0.0), p(100.0, 0.0)];
        let options = VelocityProfileOptions::new(VelocityProfile::MinimumJerk, 21);
        let profiled = apply_velocity_profile(&path, &options).unwrap();

        assert_eq!(profiled.len(), 21);
        assert_eq!(profiled[0], p(0.0, 0.0));
        assert_eq!(profiled[20], p(100.0, 0.0));
        assert!(profiled.windows(2).all(|w| w[1].x >= w[0].x));

        let first_step = profiled[1].x - profiled[0].x;
        let middle_step = profiled[11].x - profiled[10].x;
        assert!(first_step < middle_step);
        assert!((profiled[10].x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_every_profile_keeps_endpoints() {
        let path = generate_curve(
            p(0.0, 0.0),
            p(400.0, 300.0),
            &CurveOptions::default().with_num_points(40).with_seed(5),
        )
        .unwrap();
        for profile in [
            VelocityProfile::Uniform,
            VelocityProfile::MinimumJerk,
            VelocityProfile::Asymmetric,
            VelocityProfile::Sigmoid,
        ] {
            let profiled =
                apply_velocity_profile(&path, &VelocityProfileOptions::new(profile, 25)).unwrap();
            assert_eq!(profiled.len(), 25, "{profile}");
            assert_eq!(profiled[0], path[0], "{profile}");
            assert_eq!(profiled[24], path[39], "{profile}");
        }
    }
}
