//! Batch dispatcher
//!
//! Turns a list of start/end pairs into paths using the fastest available
//! route:
//!
//! 1. the active backend's native batch primitive, when it has one
//! 2. contiguous chunks fanned out over the worker pool
//! 3. sequential reference computation, when the pool is in fallback mode
//!
//! Every route runs items through [`kernels::run_item`]: an explicit seed is
//! used as is for every item, so batch output equals the single-item calls.
//! Unseeded batches draw one batch seed and derive item `i`'s seed from it,
//! which keeps the routes identical to each other.

use std::ops::Range;
use std::sync::Arc;

use futures::future::try_join_all;
use motionpool_backends::{kernels, BackendError, BackendRegistry};
use motionpool_core::{resolve_seed, MotionOperation, Path, Point};

use crate::pool::{PoolError, WorkerPool};
use crate::protocol::TaskPayload;

/// Batch dispatch errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("start and end point counts differ ({starts} vs {ends})")]
    LengthMismatch { starts: usize, ends: usize },

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("chunk at offset {offset} returned {actual} paths, expected {expected}")]
    ChunkSize {
        offset: usize,
        expected: usize,
        actual: usize,
    },
}

/// Split `len` items into contiguous ranges of `ceil(len / workers)` items
pub fn chunk_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let size = len.div_ceil(workers.max(1));
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Routes batches to the native backend, the worker pool or the reference kernels
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    registry: Arc<BackendRegistry>,
    pool: Arc<WorkerPool>,
}

impl BatchDispatcher {
    pub fn new(registry: Arc<BackendRegistry>, pool: Arc<WorkerPool>) -> Self {
        Self { registry, pool }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Compute one path per start/end pair, in input order
    ///
    /// Item `i` equals the single-item call for `starts[i]` and `ends[i]`
    /// whenever the operation carries a seed.
    pub async fn generate_batch(
        &self,
        operation: &MotionOperation,
        starts: &[Point],
        ends: &[Point],
    ) -> Result<Vec<Path>, DispatchError> {
        if starts.len() != ends.len() {
            return Err(DispatchError::LengthMismatch {
                starts: starts.len(),
                ends: ends.len(),
            });
        }
        if starts.is_empty() {
            return Ok(Vec::new());
        }

        let count = starts.len();
        let batch_seed = resolve_seed(operation.seed());

        let backend = self.registry.active_backend().await;
        if backend.supports_batch(operation) {
            match backend.run_batch(operation, starts, ends, batch_seed).await {
                Ok(paths) if paths.len() == count => {
                    tracing::debug!(
                        backend = %backend.kind(),
                        operation = operation.name(),
                        count,
                        "Batch computed by native primitive"
                    );
                    return Ok(paths);
                }
                Ok(paths) => tracing::warn!(
                    backend = %backend.kind(),
                    expected = count,
                    actual = paths.len(),
                    "Native batch returned the wrong number of paths, falling back"
                ),
                Err(e) => tracing::warn!(
                    backend = %backend.kind(),
                    error = %e,
                    "Native batch failed, falling back"
                ),
            }
        }

        let info = self.pool.info();
        if info.fallback_mode {
            tracing::debug!(
                operation = operation.name(),
                count,
                "Pool unavailable, computing batch sequentially"
            );
            return self.run_locally(operation, starts, ends, batch_seed).await;
        }

        self.run_on_pool(operation, starts, ends, batch_seed, info.live_worker_count)
            .await
    }

    async fn run_on_pool(
        &self,
        operation: &MotionOperation,
        starts: &[Point],
        ends: &[Point],
        batch_seed: u64,
        workers: usize,
    ) -> Result<Vec<Path>, DispatchError> {
        let ranges = chunk_ranges(starts.len(), workers);
        tracing::debug!(
            operation = operation.name(),
            count = starts.len(),
            chunks = ranges.len(),
            "Dispatching batch to worker pool"
        );

        let chunks = ranges.into_iter().map(|range| {
            let expected = range.len();
            let offset = range.start;
            let payload = TaskPayload::Chunk {
                operation: operation.clone(),
                offset,
                starts: starts[range.clone()].to_vec(),
                ends: ends[range].to_vec(),
                batch_seed,
            };
            async move {
                let paths: Vec<Path> = self.pool.submit_as(payload).await?;
                if paths.len() != expected {
                    return Err(DispatchError::ChunkSize {
                        offset,
                        expected,
                        actual: paths.len(),
                    });
                }
                Ok(paths)
            }
        });

        let results = try_join_all(chunks).await?;
        Ok(results.into_iter().flatten().collect())
    }

    async fn run_locally(
        &self,
        operation: &MotionOperation,
        starts: &[Point],
        ends: &[Point],
        batch_seed: u64,
    ) -> Result<Vec<Path>, DispatchError> {
        let operation = operation.clone();
        let starts = starts.to_vec();
        let ends = ends.to_vec();
        let paths = tokio::task::spawn_blocking(move || {
            kernels::run_sequential(&operation, &starts, &ends, batch_seed, 0)
        })
        .await
        .map_err(|e| BackendError::Execution(format!("sequential batch task failed: {}", e)))??;
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges_cover_input_in_order() {
        let ranges = chunk_ranges(237, 4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0], 0..60);
        assert_eq!(ranges[3], 180..237);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), 237);
        assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn test_chunk_ranges_edge_cases() {
        assert!(chunk_ranges(0, 4).is_empty());
        assert_eq!(chunk_ranges(3, 8), vec![0..1, 1..2, 2..3]);
        assert_eq!(chunk_ranges(5, 0), vec![0..5]);
    }
}
