// Motion Runtime
//
// Worker pool, task protocol and batch dispatcher.
//
// Key design decisions:
// - One coordinator task owns pending tasks, slots and timers; execution
//   contexts are OS threads that only see `TaskPayload` values
// - Task failures come back as ordinary errors; a panicking context is
//   respawned and its in-flight tasks are rejected right away
// - The dispatcher receives the pool and the backend registry explicitly

pub mod dispatcher;
pub mod pool;
pub mod protocol;
mod worker;

pub use dispatcher::{chunk_ranges, BatchDispatcher, DispatchError};
pub use pool::{PoolError, PoolInfo, PoolMetrics, PoolStatus, WorkerPool};
pub use protocol::{execute_payload, FailureKind, Probe, TaskFailure, TaskPayload};
