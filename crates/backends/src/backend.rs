// Backend Abstractions
//
// A backend is a stateless provider of the motion operation set. All kinds
// (reference, native, remote) implement `MotionBackend`; the registry hands
// out `Arc<dyn MotionBackend>` so callers never know which one they hold.
//
// Contract for implementors:
// - Operations are pure with respect to their inputs and the options' seed
// - Bad input returns `BackendError::InvalidInput`, never a panic
// - Batch results are element-wise identical to single-item results

use async_trait::async_trait;
use motionpool_core::{
    CurveOptions, JitterOptions, JitterSeries, MotionOperation, Path, PhysicsOptions, Point,
    TrajectoryOptions, VelocityProfileOptions,
};
use serde::{Deserialize, Serialize};

/// Result alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

// ============================================================================
// Errors
// ============================================================================

/// Backend errors
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum BackendError {
    /// The inputs cannot produce a path (too few points, non-finite values, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend does not offer the requested entry point
    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: BackendKind,
        operation: &'static str,
    },

    /// The backend could not be constructed on this host
    #[error("{kind} backend unavailable: {reason}")]
    Unavailable { kind: BackendKind, reason: String },

    /// A remote call failed (transport, status or payload)
    #[error("remote backend error: {0}")]
    Remote(String),

    /// Execution failed inside the backend
    #[error("backend execution failed: {0}")]
    Execution(String),
}

impl BackendError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

// ============================================================================
// Backend kinds
// ============================================================================

/// Backend kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Natively compiled, parallel batch entry points
    Native,
    /// Delegates to a separate math service with local fallback
    Remote,
    /// Portable scalar implementation, always available
    Reference,
}

impl BackendKind {
    /// All kinds in default preference order (most preferred first)
    pub const PREFERENCE_ORDER: [BackendKind; 3] =
        [BackendKind::Native, BackendKind::Remote, BackendKind::Reference];

    /// Lower is preferred; used for default selection and benchmark tie-breaks
    pub fn preference_rank(self) -> usize {
        Self::PREFERENCE_ORDER
            .iter()
            .position(|k| *k == self)
            .unwrap_or(Self::PREFERENCE_ORDER.len())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Remote => "remote",
            BackendKind::Reference => "reference",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(BackendKind::Native),
            "remote" => Ok(BackendKind::Remote),
            "reference" | "js" | "portable" => Ok(BackendKind::Reference),
            _ => Err(format!("Unknown backend kind: {}", s)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MotionBackend Trait
// ============================================================================

/// Trait for motion backends
#[async_trait]
pub trait MotionBackend: Send + Sync {
    /// Which kind this backend is
    fn kind(&self) -> BackendKind;

    /// Bézier curve path between two points
    async fn generate_curve(&self, start: Point, end: Point, options: &CurveOptions)
        -> Result<Path>;

    /// Minimum-jerk trajectory between two points
    async fn generate_trajectory(
        &self,
        start: Point,
        end: Point,
        options: &TrajectoryOptions,
    ) -> Result<Path>;

    /// Damped-spring physics simulation from start towards end
    async fn simulate_movement(
        &self,
        start: Point,
        end: Point,
        options: &PhysicsOptions,
    ) -> Result<Path>;

    /// Ornstein-Uhlenbeck jitter series
    async fn generate_jitter(&self, options: &JitterOptions) -> Result<JitterSeries>;

    /// Reparameterize an existing path along a velocity profile
    ///
    /// Defaults to the reference kernel.
    async fn apply_velocity_profile(
        &self,
        path: &[Point],
        options: &VelocityProfileOptions,
    ) -> Result<Path> {
        crate::kernels::apply_velocity_profile(path, options)
    }

    /// Run a start/end operation (dispatches to the single-item entry points)
    async fn run(&self, operation: &MotionOperation, start: Point, end: Point) -> Result<Path> {
        match operation {
            MotionOperation::Curve(o) => self.generate_curve(start, end, o).await,
            MotionOperation::Trajectory(o) => self.generate_trajectory(start, end, o).await,
            MotionOperation::Physics(o) => self.simulate_movement(start, end, o).await,
        }
    }

    /// Whether `run_batch` is a native primitive for this operation
    fn supports_batch(&self, _operation: &MotionOperation) -> bool {
        false
    }

    /// Run `operation` for every start/end pair in one call.
    ///
    /// Item `i` must equal [`kernels::run_item`](crate::kernels::run_item)
    /// for `starts[i]`, `ends[i]`, `batch_seed` and `i`. With a seeded
    /// operation that is exactly `run(operation, starts[i], ends[i])`.
    async fn run_batch(
        &self,
        operation: &MotionOperation,
        _starts: &[Point],
        _ends: &[Point],
        _batch_seed: u64,
    ) -> Result<Vec<Path>> {
        Err(BackendError::Unsupported {
            backend: self.kind(),
            operation: operation.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("native".parse::<BackendKind>(), Ok(BackendKind::Native));
        assert_eq!("REMOTE".parse::<BackendKind>(), Ok(BackendKind::Remote));
        assert_eq!("reference".parse::<BackendKind>(), Ok(BackendKind::Reference));
        assert!("wasm".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_preference_order() {
        assert!(BackendKind::Native.preference_rank() < BackendKind::Remote.preference_rank());
        assert!(BackendKind::Remote.preference_rank() < BackendKind::Reference.preference_rank());
        assert_eq!(BackendKind::Reference.to_string(), "reference");
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::Unsupported {
            backend: BackendKind::Reference,
            operation: "curve",
        };
        assert_eq!(err.to_string(), "reference backend does not support curve");
    }
}
