// Motion Backends
//
// Numerical backends behind one async trait, plus the registry that discovers
// them and picks the active one.
//
// Key design decisions:
// - `kernels` holds the only implementation of the math; backends differ in
//   where and how they run it (inline, rayon pool, remote service)
// - The reference backend is always available; every other tier degrades to it
// - A seeded operation runs every batch item with that seed, so batches equal
//   single-item calls; unseeded batches derive item seeds from one batch seed

pub mod backend;
pub mod benchmark;
pub mod circuit_breaker;
pub mod kernels;
#[cfg(feature = "native")]
pub mod native;
pub mod reference;
pub mod registry;
pub mod remote;

pub use backend::{BackendError, BackendKind, MotionBackend, Result};
pub use benchmark::{BackendScore, BenchmarkReport, TimingStats};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
#[cfg(feature = "native")]
pub use native::NativeBackend;
pub use reference::ReferenceBackend;
pub use registry::{default_factories, BackendFactory, BackendRegistry, RemoteFactory};
pub use remote::RemoteBackend;
