//! Batch dispatch across the native, pooled and sequential routes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use motionpool_backends::{
    kernels, BackendError, BackendFactory, BackendKind, BackendRegistry, MotionBackend,
    ReferenceBackend, Result,
};
use motionpool_core::{
    BackendConfig, CurveOptions, JitterOptions, JitterSeries, MotionOperation, Path,
    PhysicsOptions, PoolConfig, Point, TrajectoryOptions,
};
use motionpool_runtime::{BatchDispatcher, DispatchError, WorkerPool};

const SEED: u64 = 12345;

fn pool_config(workers: i64) -> PoolConfig {
    PoolConfig::default()
        .with_worker_count(workers)
        .with_task_timeout(Duration::from_secs(10))
        .with_respawn_backoff(Duration::from_millis(20))
}

fn reference_only() -> Arc<BackendRegistry> {
    Arc::new(BackendRegistry::new(BackendConfig::default().without_native()))
}

fn points(n: usize) -> (Vec<Point>, Vec<Point>) {
    let starts = (0..n)
        .map(|i| Point::new(i as f64 * 3.0, (i % 17) as f64 * 11.0))
        .collect();
    let ends = (0..n)
        .map(|i| Point::new(800.0 - i as f64, 100.0 + (i % 29) as f64 * 7.0))
        .collect();
    (starts, ends)
}

fn curve() -> MotionOperation {
    MotionOperation::Curve(CurveOptions::default().with_num_points(25).with_seed(SEED))
}

#[test_log::test(tokio::test)]
async fn test_pooled_batch_matches_single_item_calls() -> anyhow::Result<()> {
    let registry = reference_only();
    let pool = Arc::new(WorkerPool::start_with(pool_config(4)).await?);
    assert_eq!(pool.info().live_worker_count, 4);
    let dispatcher = BatchDispatcher::new(Arc::clone(&registry), Arc::clone(&pool));

    let operation = curve();
    let (starts, ends) = points(237);
    let paths = dispatcher.generate_batch(&operation, &starts, &ends).await?;

    // Every item equals the plain single-item call with the same seeded options
    assert_eq!(paths.len(), 237);
    for i in 0..paths.len() {
        let single = ReferenceBackend.run(&operation, starts[i], ends[i]).await?;
        assert_eq!(paths[i], single, "item {i} differs from its single-item call");
        assert_eq!(paths[i][0], starts[i]);
    }

    // One chunk per live worker
    assert_eq!(pool.metrics().submitted, 4);
    pool.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_unseeded_batch_items_get_distinct_seeds() -> anyhow::Result<()> {
    let pool = Arc::new(WorkerPool::start_with(pool_config(2)).await?);
    let dispatcher = BatchDispatcher::new(reference_only(), Arc::clone(&pool));

    let operation = MotionOperation::Curve(CurveOptions::default().with_num_points(25));
    let starts = vec![Point::new(0.0, 0.0); 6];
    let ends = vec![Point::new(600.0, 400.0); 6];
    let paths = dispatcher.generate_batch(&operation, &starts, &ends).await?;

    assert_eq!(paths.len(), 6);
    assert!(paths.windows(2).any(|w| w[0] != w[1]));

    pool.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_length_mismatch_fails_before_any_work() {
    let registry = reference_only();
    let pool = Arc::new(WorkerPool::new(pool_config(2)));
    let dispatcher = BatchDispatcher::new(Arc::clone(&registry), Arc::clone(&pool));

    let (starts, _) = points(3);
    let (_, ends) = points(2);
    let err = dispatcher
        .generate_batch(&curve(), &starts, &ends)
        .await
        .unwrap_err();

    assert_eq!(err, DispatchError::LengthMismatch { starts: 3, ends: 2 });
    assert!(!registry.is_initialized());
    assert_eq!(pool.metrics().rejected, 0);
}

#[tokio::test]
async fn test_empty_batch_returns_empty() {
    let registry = reference_only();
    let pool = Arc::new(WorkerPool::new(pool_config(2)));
    let dispatcher = BatchDispatcher::new(Arc::clone(&registry), pool);

    let paths = dispatcher.generate_batch(&curve(), &[], &[]).await.unwrap();
    assert!(paths.is_empty());
    assert!(!registry.is_initialized());
}

#[tokio::test]
async fn test_stopped_pool_computes_sequentially() {
    let pool = Arc::new(WorkerPool::new(pool_config(2)));
    let dispatcher = BatchDispatcher::new(reference_only(), Arc::clone(&pool));
    assert!(pool.info().fallback_mode);

    let operation = MotionOperation::Trajectory(
        TrajectoryOptions::default()
            .with_num_points(30)
            .two_phase(0.3)
            .with_seed(SEED),
    );
    let (starts, ends) = points(20);
    let paths = dispatcher
        .generate_batch(&operation, &starts, &ends)
        .await
        .unwrap();

    let expected = kernels::run_sequential(&operation, &starts, &ends, SEED, 0).unwrap();
    assert_eq!(paths, expected);
    assert!(paths.iter().all(|p| p.len() == 30));
    assert_eq!(pool.metrics().submitted, 0);
}

#[tokio::test]
async fn test_chunk_failure_fails_the_batch() {
    let pool = Arc::new(WorkerPool::start_with(pool_config(2)).await.unwrap());
    let dispatcher = BatchDispatcher::new(reference_only(), Arc::clone(&pool));

    let operation = MotionOperation::Curve(CurveOptions::default().with_num_points(1));
    let (starts, ends) = points(8);
    let err = dispatcher
        .generate_batch(&operation, &starts, &ends)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Pool(_)), "unexpected error: {err:?}");

    pool.shutdown().await;
}

#[cfg(feature = "native")]
#[tokio::test]
async fn test_native_batch_matches_pooled_batch() {
    let native = Arc::new(BackendRegistry::new(BackendConfig::default()));
    assert_eq!(native.active_backend().await.kind(), BackendKind::Native);

    let pool = Arc::new(WorkerPool::start_with(pool_config(3)).await.unwrap());
    let operation = MotionOperation::Physics(PhysicsOptions::default().with_seed(SEED));
    let (starts, ends) = points(40);

    let from_native = BatchDispatcher::new(native, Arc::clone(&pool))
        .generate_batch(&operation, &starts, &ends)
        .await
        .unwrap();
    assert_eq!(pool.metrics().submitted, 0);

    let from_pool = BatchDispatcher::new(reference_only(), Arc::clone(&pool))
        .generate_batch(&operation, &starts, &ends)
        .await
        .unwrap();
    assert_eq!(from_native, from_pool);

    pool.shutdown().await;
}

/// Claims a batch primitive that always fails
struct FailingBatchBackend {
    batch_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MotionBackend for FailingBatchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    async fn generate_curve(&self, start: Point, end: Point, options: &CurveOptions) -> Result<Path> {
        ReferenceBackend.generate_curve(start, end, options).await
    }

    async fn generate_trajectory(
        &self,
        start: Point,
        end: Point,
        options: &TrajectoryOptions,
    ) -> Result<Path> {
        ReferenceBackend.generate_trajectory(start, end, options).await
    }

    async fn simulate_movement(
        &self,
        start: Point,
        end: Point,
        options: &PhysicsOptions,
    ) -> Result<Path> {
        ReferenceBackend.simulate_movement(start, end, options).await
    }

    async fn generate_jitter(&self, options: &JitterOptions) -> Result<JitterSeries> {
        ReferenceBackend.generate_jitter(options).await
    }

    fn supports_batch(&self, _operation: &MotionOperation) -> bool {
        true
    }

    async fn run_batch(
        &self,
        _operation: &MotionOperation,
        _starts: &[Point],
        _ends: &[Point],
        _batch_seed: u64,
    ) -> Result<Vec<Path>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Execution("batch kernel crashed".to_string()))
    }
}

struct FailingBatchFactory {
    batch_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl BackendFactory for FailingBatchFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn is_available(&self, _config: &BackendConfig) -> bool {
        true
    }

    async fn create(&self, _config: &BackendConfig) -> Result<Arc<dyn MotionBackend>> {
        Ok(Arc::new(FailingBatchBackend {
            batch_calls: Arc::clone(&self.batch_calls),
        }))
    }
}

#[test_log::test(tokio::test)]
async fn test_failed_native_batch_falls_back_to_pool() {
    let batch_calls = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(BackendRegistry::with_factories(
        BackendConfig::default(),
        vec![Arc::new(FailingBatchFactory {
            batch_calls: Arc::clone(&batch_calls),
        }) as Arc<dyn BackendFactory>],
    ));
    let pool = Arc::new(WorkerPool::start_with(pool_config(2)).await.unwrap());
    let dispatcher = BatchDispatcher::new(registry, Arc::clone(&pool));

    let operation = curve();
    let (starts, ends) = points(10);
    let paths = dispatcher
        .generate_batch(&operation, &starts, &ends)
        .await
        .unwrap();

    assert_eq!(batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(pool.metrics().submitted, 2);
    assert_eq!(
        paths,
        kernels::run_sequential(&operation, &starts, &ends, SEED, 0).unwrap()
    );

    pool.shutdown().await;
}
