//! Backend benchmarking
//!
//! A fixed battery of operations is timed against every registered backend:
//! one warm-up run, then `iterations` timed runs per operation. Each backend
//! gets a weighted score, `sum(weight * 1000 / mean_ms)`, so faster backends
//! score higher. A backend that fails any operation is disqualified.

use std::time::{Duration, Instant};

use motionpool_core::{CurveOptions, MotionOperation, PhysicsOptions, Point, TrajectoryOptions};
use serde::Serialize;

use crate::backend::{BackendKind, MotionBackend};

/// Battery seed, so every backend computes the same paths
const BENCH_SEED: u64 = 0x5EED;

/// Floor for mean timings, keeps the score finite for sub-microsecond runs
const MIN_MEAN_MS: f64 = 0.001;

// ============================================================================
// Timing statistics
// ============================================================================

/// Wall-clock statistics for one operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    count: u32,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl Default for TimingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    /// Record a sample
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total += duration;
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count
        }
    }

    pub fn min(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.min
        }
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean().as_secs_f64() * 1000.0
    }
}

impl Serialize for TimingStats {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("TimingStats", 4)?;
        s.serialize_field("count", &self.count)?;
        s.serialize_field("mean_ms", &self.mean_ms())?;
        s.serialize_field("min_ms", &(self.min().as_secs_f64() * 1000.0))?;
        s.serialize_field("max_ms", &(self.max.as_secs_f64() * 1000.0))?;
        s.end()
    }
}

// ============================================================================
// Battery
// ============================================================================

/// One timed operation in the battery
#[derive(Debug, Clone)]
pub struct BenchmarkCase {
    pub name: &'static str,
    pub weight: f64,
    pub operation: MotionOperation,
    pub start: Point,
    pub end: Point,
}

/// Small curve, large curve, trajectory and physics simulation
pub fn default_battery() -> Vec<BenchmarkCase> {
    vec![
        BenchmarkCase {
            name: "small_curve",
            weight: 1.0,
            operation: MotionOperation::Curve(
                CurveOptions::default().with_num_points(50).with_seed(BENCH_SEED),
            ),
            start: Point::new(100.0, 100.0),
            end: Point::new(400.0, 300.0),
        },
        BenchmarkCase {
            name: "large_curve",
            weight: 2.0,
            operation: MotionOperation::Curve(
                CurveOptions::default().with_num_points(1000).with_seed(BENCH_SEED),
            ),
            start: Point::new(0.0, 0.0),
            end: Point::new(1500.0, 900.0),
        },
        BenchmarkCase {
            name: "trajectory",
            weight: 1.0,
            operation: MotionOperation::Trajectory(
                TrajectoryOptions::default()
                    .with_num_points(100)
                    .two_phase(0.5)
                    .with_seed(BENCH_SEED),
            ),
            start: Point::new(50.0, 500.0),
            end: Point::new(900.0, 120.0),
        },
        BenchmarkCase {
            name: "physics",
            weight: 1.5,
            operation: MotionOperation::Physics(PhysicsOptions::default().with_seed(BENCH_SEED)),
            start: Point::new(0.0, 0.0),
            end: Point::new(300.0, 200.0),
        },
    ]
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub name: &'static str,
    pub stats: TimingStats,
}

/// Benchmark outcome for one backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendScore {
    pub kind: BackendKind,
    pub cases: Vec<CaseResult>,
    pub score: f64,
    /// Set when an operation failed; the backend is not eligible for selection
    pub error: Option<String>,
}

impl BackendScore {
    pub fn is_eligible(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a full benchmarking run
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub selected: BackendKind,
    pub scores: Vec<BackendScore>,
}

/// Time the battery against one backend
pub async fn benchmark_backend(
    backend: &dyn MotionBackend,
    battery: &[BenchmarkCase],
    iterations: usize,
) -> BackendScore {
    let kind = backend.kind();
    let iterations = iterations.max(1);
    let mut cases = Vec::with_capacity(battery.len());
    let mut score = 0.0;

    for case in battery {
        let mut stats = TimingStats::new();

        // Warm-up run is not timed
        let warm_up = backend.run(&case.operation, case.start, case.end).await;
        if let Err(e) = warm_up {
            return failed(kind, cases, case.name, e.to_string());
        }

        for _ in 0..iterations {
            let started = Instant::now();
            let result = backend.run(&case.operation, case.start, case.end).await;
            let elapsed = started.elapsed();
            if let Err(e) = result {
                return failed(kind, cases, case.name, e.to_string());
            }
            stats.record(elapsed);
        }

        score += case.weight * 1000.0 / stats.mean_ms().max(MIN_MEAN_MS);
        tracing::debug!(
            backend = %kind,
            case = case.name,
            mean_ms = stats.mean_ms(),
            "Benchmark case finished"
        );
        cases.push(CaseResult {
            name: case.name,
            stats,
        });
    }

    BackendScore {
        kind,
        cases,
        score,
        error: None,
    }
}

fn failed(
    kind: BackendKind,
    cases: Vec<CaseResult>,
    case: &'static str,
    error: String,
) -> BackendScore {
    tracing::warn!(backend = %kind, case, error = %error, "Benchmark case failed");
    BackendScore {
        kind,
        cases,
        score: 0.0,
        error: Some(format!("{}: {}", case, error)),
    }
}

/// Highest eligible score wins; equal scores go to the preferred kind
pub fn select_best(scores: &[BackendScore]) -> Option<BackendKind> {
    scores
        .iter()
        .filter(|s| s.is_eligible())
        .max_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| b.kind.preference_rank().cmp(&a.kind.preference_rank()))
        })
        .map(|s| s.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceBackend;

    fn score(kind: BackendKind, score: f64, error: Option<&str>) -> BackendScore {
        BackendScore {
            kind,
            cases: Vec::new(),
            score,
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_timing_stats() {
        let mut stats = TimingStats::new();
        assert_eq!(stats.mean(), Duration::ZERO);
        assert_eq!(stats.min(), Duration::ZERO);

        stats.record(Duration::from_millis(2));
        stats.record(Duration::from_millis(4));
        stats.record(Duration::from_millis(6));
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.mean(), Duration::from_millis(4));
        assert_eq!(stats.min(), Duration::from_millis(2));
        assert_eq!(stats.max(), Duration::from_millis(6));
        assert!((stats.mean_ms() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_select_best_prefers_higher_score() {
        let scores = vec![
            score(BackendKind::Reference, 10.0, None),
            score(BackendKind::Remote, 30.0, None),
            score(BackendKind::Native, 50.0, Some("physics: boom")),
        ];
        assert_eq!(select_best(&scores), Some(BackendKind::Remote));
    }

    #[test]
    fn test_select_best_tie_goes_to_preferred_kind() {
        let scores = vec![
            score(BackendKind::Reference, 20.0, None),
            score(BackendKind::Native, 20.0, None),
        ];
        assert_eq!(select_best(&scores), Some(BackendKind::Native));
        assert_eq!(select_best(&[]), None);
    }

    #[tokio::test]
    async fn test_benchmark_reference_backend() {
        let battery = default_battery();
        let result = benchmark_backend(&ReferenceBackend::new(), &battery, 2).await;
        assert!(result.is_eligible());
        assert_eq!(result.cases.len(), 4);
        assert!(result.cases.iter().all(|c| c.stats.count() == 2));
        assert!(result.score > 0.0);
    }
}
