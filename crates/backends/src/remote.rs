//! Remote backend: delegates to a separate math service over HTTP.
//!
//! Endpoints (JSON):
//! - `GET  /api/health`
//! - `POST /api/bezier`        `{p0, p1, p2, p3, numPoints}` -> `{path}`
//! - `POST /api/minimum-jerk`  `{start, end, numPoints, twoPhase, overshootFactor, randomSeed}` -> `{path}`
//! - `POST /api/physics`       `{start, end, options}` -> `{path}`
//! - `POST /api/ou-process`    `{points, theta, sigma, dt, randomSeed, ...}` -> `{jitterX, jitterY}`
//! - `POST /api/velocity-profile` `{path, velocityProfile, numPoints}` -> `{path}`
//!
//! Failed calls never reach the caller: the backend logs a warning and
//! computes the result with the local kernels. A circuit breaker skips the
//! network entirely while the service keeps failing.

use std::time::Duration;

use async_trait::async_trait;
use motionpool_core::{
    CurveOptions, JitterOptions, JitterSeries, Path, PhysicsOptions, Point, TrajectoryOptions,
    VelocityProfile, VelocityProfileOptions,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::backend::{BackendError, BackendKind, MotionBackend, Result};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::kernels;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BezierRequest {
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
    num_points: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MinimumJerkRequest {
    start: Point,
    end: Point,
    num_points: usize,
    two_phase: bool,
    overshoot_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    random_seed: Option<u32>,
}

#[derive(Debug, Serialize)]
struct PhysicsRequest {
    start: Point,
    end: Point,
    options: PhysicsOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OuProcessRequest {
    points: usize,
    theta: f64,
    sigma: f64,
    dt: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    random_seed: Option<u32>,
    position_dependent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    theta_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sigma_scale: Option<f64>,
}

impl From<&JitterOptions> for OuProcessRequest {
    fn from(options: &JitterOptions) -> Self {
        Self {
            points: options.points,
            theta: options.theta,
            sigma: options.sigma,
            dt: options.dt,
            random_seed: service_seed(options.seed),
            position_dependent: options.position_dependence.is_some(),
            theta_scale: options.position_dependence.map(|d| d.theta_scale),
            sigma_scale: options.position_dependence.map(|d| d.sigma_scale),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VelocityProfileRequest<'a> {
    path: &'a [Point],
    velocity_profile: VelocityProfile,
    num_points: usize,
}

/// The service seeds NumPy, which only accepts 32-bit seeds
fn service_seed(seed: Option<u64>) -> Option<u32> {
    seed.map(|s| (s ^ (s >> 32)) as u32)
}

#[derive(Debug, Deserialize)]
struct PathResponse {
    path: Path,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// RemoteBackend
// ============================================================================

pub struct RemoteBackend {
    base_url: String,
    http: reqwest::Client,
    breaker: CircuitBreaker,
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("base_url", &self.base_url)
            .field("circuit", &self.breaker.state())
            .finish()
    }
}

impl RemoteBackend {
    /// Create a backend for `base_url` without contacting it
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::with_breaker(base_url, timeout, CircuitBreakerConfig::default())
    }

    pub fn with_breaker(
        base_url: &str,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable {
                kind: BackendKind::Remote,
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            breaker: CircuitBreaker::new(breaker),
        })
    }

    /// Create a backend and verify the service answers its health check
    pub async fn connect(base_url: &str, timeout: Duration) -> Result<Self> {
        let backend = Self::new(base_url, timeout)?;
        backend
            .health_check()
            .await
            .map_err(|e| BackendError::Unavailable {
                kind: BackendKind::Remote,
                reason: e.to_string(),
            })?;
        tracing::info!(url = %backend.base_url, "Remote math service reachable");
        Ok(backend)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Remote(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Remote(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.breaker
            .allow()
            .map_err(|e| BackendError::Remote(e.to_string()))?;

        let result = self.send(path, body).await;
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }

    async fn send<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(BackendError::Remote(format!("{} ({})", message, status)));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Remote(format!("invalid response body: {}", e)))
    }

    /// Use the remote result, or the local computation when the call failed
    fn or_local<T>(
        &self,
        operation: &'static str,
        remote: Result<T>,
        local: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        match remote {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(
                    backend = "remote",
                    operation,
                    error = %e,
                    "Remote call failed, computing locally"
                );
                local()
            }
        }
    }
}

#[async_trait]
impl MotionBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn generate_curve(
        &self,
        start: Point,
        end: Point,
        options: &CurveOptions,
    ) -> Result<Path> {
        kernels::check_num_points(options.num_points)?;
        let (p1, p2) = kernels::curve_control_points(start, end, options)?;
        let request = BezierRequest {
            p0: start,
            p1,
            p2,
            p3: end,
            num_points: options.num_points,
        };
        let remote = self
            .post::<_, PathResponse>("/api/bezier", &request)
            .await
            .map(|r| r.path);
        self.or_local("curve", remote, || {
            kernels::bezier_curve(start, p1, p2, end, options.num_points)
        })
    }

    async fn generate_trajectory(
        &self,
        start: Point,
        end: Point,
        options: &TrajectoryOptions,
    ) -> Result<Path> {
        kernels::check_num_points(options.num_points)?;
        kernels::check_point("start", start)?;
        kernels::check_point("end", end)?;
        let request = MinimumJerkRequest {
            start,
            end,
            num_points: options.num_points,
            two_phase: options.two_phase,
            overshoot_factor: options.overshoot_factor,
            random_seed: service_seed(options.seed),
        };
        let remote = self
            .post::<_, PathResponse>("/api/minimum-jerk", &request)
            .await
            .map(|r| r.path);
        self.or_local("trajectory", remote, || {
            kernels::generate_trajectory(start, end, options)
        })
    }

    async fn simulate_movement(
        &self,
        start: Point,
        end: Point,
        options: &PhysicsOptions,
    ) -> Result<Path> {
        kernels::validate_physics(start, end, options)?;
        let request = PhysicsRequest {
            start,
            end,
            options: PhysicsOptions {
                seed: service_seed(options.seed).map(u64::from),
                ..options.clone()
            },
        };
        let remote = self
            .post::<_, PathResponse>("/api/physics", &request)
            .await
            .map(|r| r.path);
        self.or_local("physics", remote, || {
            kernels::simulate_movement(start, end, options)
        })
    }

    async fn generate_jitter(&self, options: &JitterOptions) -> Result<JitterSeries> {
        kernels::validate_jitter(options)?;
        let request = OuProcessRequest::from(options);
        let remote = self
            .post::<_, JitterSeries>("/api/ou-process", &request)
            .await;
        self.or_local("jitter", remote, || kernels::generate_jitter(options))
    }

    async fn apply_velocity_profile(
        &self,
        path: &[Point],
        options: &VelocityProfileOptions,
    ) -> Result<Path> {
        kernels::check_num_points(options.num_points)?;
        if path.is_empty() {
            return Err(BackendError::invalid("path must not be empty"));
        }
        let request = VelocityProfileRequest {
            path,
            velocity_profile: options.profile,
            num_points: options.num_points,
        };
        let remote = self
            .post::<_, PathResponse>("/api/velocity-profile", &request)
            .await
            .map(|r| r.path);
        self.or_local("velocity_profile", remote, || {
            kernels::apply_velocity_profile(path, options)
        })
    }
}
