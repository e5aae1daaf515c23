//! Native backend: the kernels fanned out over a dedicated rayon pool.
//!
//! Single-item calls run inline like the reference backend. The batch entry
//! point runs the whole input on the rayon pool from a blocking task, so the
//! async runtime never stalls on a large batch. Items go through
//! [`kernels::run_item`] with their global index, which keeps the output
//! identical to the sequential path.

use std::sync::Arc;

use async_trait::async_trait;
use motionpool_core::{
    CurveOptions, JitterOptions, JitterSeries, MotionOperation, Path, PhysicsOptions, Point,
    TrajectoryOptions,
};
use rayon::prelude::*;

use crate::backend::{BackendError, BackendKind, MotionBackend, Result};
use crate::kernels;

pub struct NativeBackend {
    pool: Arc<rayon::ThreadPool>,
    threads: usize,
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("threads", &self.threads)
            .finish()
    }
}

impl NativeBackend {
    /// Build the backend with `threads` rayon threads (0 lets rayon decide)
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("motionpool-native-{}", i))
            .build()
            .map_err(|e| BackendError::Unavailable {
                kind: BackendKind::Native,
                reason: e.to_string(),
            })?;
        let threads = pool.current_num_threads();
        tracing::debug!(threads, "Native backend thread pool ready");
        Ok(Self {
            pool: Arc::new(pool),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

#[async_trait]
impl MotionBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    async fn generate_curve(
        &self,
        start: Point,
        end: Point,
        options: &CurveOptions,
    ) -> Result<Path> {
        kernels::generate_curve(start, end, options)
    }

    async fn generate_trajectory(
        &self,
        start: Point,
        end: Point,
        options: &TrajectoryOptions,
    ) -> Result<Path> {
        kernels::generate_trajectory(start, end, options)
    }

    async fn simulate_movement(
        &self,
        start: Point,
        end: Point,
        options: &PhysicsOptions,
    ) -> Result<Path> {
        kernels::simulate_movement(start, end, options)
    }

    async fn generate_jitter(&self, options: &JitterOptions) -> Result<JitterSeries> {
        kernels::generate_jitter(options)
    }

    fn supports_batch(&self, _operation: &MotionOperation) -> bool {
        true
    }

    async fn run_batch(
        &self,
        operation: &MotionOperation,
        starts: &[Point],
        ends: &[Point],
        batch_seed: u64,
    ) -> Result<Vec<Path>> {
        if starts.len() != ends.len() {
            return Err(BackendError::invalid(format!(
                "start and end lengths differ ({} vs {})",
                starts.len(),
                ends.len()
            )));
        }
        if starts.is_empty() {
            return Ok(Vec::new());
        }

        let pool = Arc::clone(&self.pool);
        let operation = operation.clone();
        let pairs: Vec<(Point, Point)> = starts.iter().copied().zip(ends.iter().copied()).collect();

        tokio::task::spawn_blocking(move || {
            pool.install(|| {
                pairs
                    .par_iter()
                    .enumerate()
                    .map(|(i, (s, e))| kernels::run_item(&operation, *s, *e, batch_seed, i))
                    .collect::<Result<Vec<Path>>>()
            })
        })
        .await
        .map_err(|e| BackendError::Execution(format!("native batch task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_matches_sequential_kernels() {
        let backend = NativeBackend::new(2).unwrap();
        let op = MotionOperation::Curve(CurveOptions::default().with_num_points(30));
        let starts: Vec<Point> = (0..25).map(|i| Point::new(i as f64, 0.0)).collect();
        let ends: Vec<Point> = (0..25).map(|i| Point::new(400.0, i as f64 * 7.0)).collect();

        let batch = backend.run_batch(&op, &starts, &ends, 12345).await.unwrap();
        let sequential = kernels::run_sequential(&op, &starts, &ends, 12345, 0).unwrap();
        assert_eq!(batch, sequential);
        assert!(backend.supports_batch(&op));
    }

    #[tokio::test]
    async fn test_batch_propagates_item_errors() {
        let backend = NativeBackend::new(1).unwrap();
        let op = MotionOperation::Curve(CurveOptions::default().with_num_points(1));
        let err = backend
            .run_batch(&op, &[Point::default()], &[Point::new(1.0, 1.0)], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let backend = NativeBackend::new(1).unwrap();
        let op = MotionOperation::Physics(PhysicsOptions::default());
        assert!(backend.run_batch(&op, &[], &[], 0).await.unwrap().is_empty());
        assert_eq!(backend.threads(), 1);
    }
}
