//! Reference backend: the portable kernels behind the backend trait.
//!
//! Always registered. Kernels run inline on the calling task; they are short
//! and CPU-bound, and callers that batch large inputs go through the worker
//! pool instead.

use async_trait::async_trait;
use motionpool_core::{
    CurveOptions, JitterOptions, JitterSeries, Path, PhysicsOptions, Point, TrajectoryOptions,
};

use crate::backend::{BackendKind, MotionBackend, Result};
use crate::kernels;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend;

impl ReferenceBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MotionBackend for ReferenceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Reference
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
}
