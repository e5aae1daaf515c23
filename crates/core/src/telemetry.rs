// Telemetry Module
//
// Console tracing setup shared by every binary and test harness that embeds
// the pool. Library code only emits `tracing` events; installing a subscriber
// is the embedding application's call.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// ============================================================================
// Telemetry Configuration
// ============================================================================

/// Configuration for tracing output
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name recorded on startup
    pub service_name: String,
    /// Whether to enable console logging
    pub enable_console: bool,
    /// Log filter (e.g., "info", "debug", "motionpool_runtime=debug")
    pub log_filter: Option<String>,
    /// Include thread names in log lines (useful to tell execution contexts apart)
    pub with_thread_names: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "motionpool".to_string(),
            enable_console: true,
            log_filter: None,
            with_thread_names: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `MOTIONPOOL_SERVICE_NAME`: Service name (default: "motionpool")
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("MOTIONPOOL_SERVICE_NAME")
                .unwrap_or_else(|_| "motionpool".to_string()),
            enable_console: true,
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            with_thread_names: true,
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Install the global tracing subscriber
///
/// Returns `false` when a subscriber was already installed (for example by a
/// test harness); the existing subscriber is left untouched.
///
/// # Example
///
/// ```ignore
/// use motionpool_core::telemetry::{init_tracing, TelemetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     init_tracing(TelemetryConfig::from_env());
///     // ... build the registry and pool
/// }
/// ```
pub fn init_tracing(config: TelemetryConfig) -> bool {
    let filter = config
        .log_filter
        .as_ref()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let console_layer = if config.enable_console {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(config.with_thread_names)
                .with_filter(filter),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %config.service_name, "Tracing initialized");
    }
    installed
}
