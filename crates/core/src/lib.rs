// Motion Core
//
// Shared vocabulary for the motionpool workspace: geometry, operation options,
// seed derivation, configuration and tracing setup.
//
// Key design decisions:
// - Option structs are plain serde data so they cross thread and HTTP boundaries unchanged
// - Explicit seeds pass through to every item; unseeded batches derive item seeds (see `seed`)
// - Configuration is explicit; nothing in the workspace reads globals after startup

pub mod config;
pub mod geometry;
pub mod options;
pub mod seed;

// Telemetry (console tracing setup)
pub mod telemetry;

// Re-exports for convenience
pub use config::{BackendConfig, ConfigError, PoolConfig, MAX_WORKER_COUNT};
pub use geometry::{JitterSeries, Path, Point};
pub use options::{
    CurveOptions, JitterOptions, MotionOperation, PhysicsOptions, PositionDependence,
    TrajectoryOptions, VelocityProfile, VelocityProfileOptions,
};
pub use seed::{item_seed, resolve_seed};
