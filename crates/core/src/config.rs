//! Configuration for the worker pool and backend discovery
//!
//! Both structs deserialize with defaults (durations as milliseconds) and can
//! be built from `MOTIONPOOL_*` environment variables. A `.env` file in the
//! working directory is honored.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Pool configuration
// =============================================================================

/// Hard upper bound on execution contexts; larger requests fail validation
pub const MAX_WORKER_COUNT: i64 = 1024;

/// Resolved worker counts never exceed this many contexts per core
const WORKERS_PER_CORE: usize = 4;

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Requested number of execution contexts. `None` uses half of the
    /// available hardware parallelism. Zero or negative requests clamp to 1;
    /// large requests clamp to four per core.
    pub worker_count: Option<i64>,

    /// Upper bound on pending (unresolved) tasks
    pub max_queue_size: usize,

    /// Per-task deadline measured from submission
    #[serde(with = "duration_millis")]
    pub task_timeout: Duration,

    /// Delay before a crashed execution context is replaced
    #[serde(with = "duration_millis")]
    pub respawn_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            max_queue_size: 10_000,
            task_timeout: Duration::from_secs(30),
            respawn_backoff: Duration::from_millis(500),
        }
    }
}

impl PoolConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `MOTIONPOOL_WORKER_COUNT`: execution contexts (default: half the cores)
    /// - `MOTIONPOOL_MAX_QUEUE_SIZE`: pending task bound (default: 10000)
    /// - `MOTIONPOOL_TASK_TIMEOUT_MS`: per-task timeout (default: 30000)
    /// - `MOTIONPOOL_RESPAWN_BACKOFF_MS`: crash respawn delay (default: 500)
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            worker_count: env_parse("MOTIONPOOL_WORKER_COUNT"),
            max_queue_size: env_parse("MOTIONPOOL_MAX_QUEUE_SIZE")
                .unwrap_or(defaults.max_queue_size),
            task_timeout: env_parse("MOTIONPOOL_TASK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.task_timeout),
            respawn_backoff: env_parse("MOTIONPOOL_RESPAWN_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.respawn_backoff),
        }
    }

    /// Set the requested worker count (clamped when resolved)
    pub fn with_worker_count(mut self, count: i64) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_respawn_backoff(mut self, backoff: Duration) -> Self {
        self.respawn_backoff = backoff;
        self
    }

    /// Resolve the worker count: explicit requests clamp to
    /// `1..=max(4 * cores, 4)`, the default is half of the detected
    /// parallelism (at least 1)
    pub fn resolved_worker_count(&self) -> usize {
        let cores = available_cores();
        match self.worker_count {
            Some(requested) if requested >= 1 => {
                let ceiling = (cores * WORKERS_PER_CORE)
                    .max(WORKERS_PER_CORE)
                    .min(MAX_WORKER_COUNT as usize);
                (requested.min(MAX_WORKER_COUNT) as usize).min(ceiling)
            }
            Some(_) => 1,
            None => (cores / 2).max(1),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "max_queue_size must be greater than zero".into(),
            ));
        }
        if let Some(requested) = self.worker_count {
            if requested > MAX_WORKER_COUNT {
                return Err(ConfigError::Invalid(format!(
                    "worker_count must be at most {}, got {}",
                    MAX_WORKER_COUNT, requested
                )));
            }
        }
        if self.task_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "task_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Backend configuration
// =============================================================================

/// Backend discovery and benchmarking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of a remote math service (e.g. "http://127.0.0.1:3000").
    /// The remote backend is only probed when this is set.
    pub remote_url: Option<String>,

    /// Request timeout for remote calls
    #[serde(with = "duration_millis")]
    pub remote_timeout: Duration,

    /// Skip the native backend even when it is available
    pub disable_native: bool,

    /// Timed repetitions per benchmark operation (after one warm-up run)
    pub bench_iterations: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_timeout: Duration::from_secs(2),
            disable_native: false,
            bench_iterations: 5,
        }
    }
}

impl BackendConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `MOTIONPOOL_REMOTE_URL`: remote math service base URL
    /// - `MOTIONPOOL_DISABLE_NATIVE`: "true" to skip the native backend
    /// - `MOTIONPOOL_BENCH_ITERATIONS`: benchmark repetitions (default: 5)
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            remote_url: std::env::var("MOTIONPOOL_REMOTE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            remote_timeout: defaults.remote_timeout,
            disable_native: std::env::var("MOTIONPOOL_DISABLE_NATIVE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            bench_iterations: env_parse("MOTIONPOOL_BENCH_ITERATIONS")
                .unwrap_or(defaults.bench_iterations),
        }
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn without_native(mut self) -> Self {
        self.disable_native = true;
        self
    }

    pub fn with_bench_iterations(mut self, iterations: usize) -> Self {
        self.bench_iterations = iterations.max(1);
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
