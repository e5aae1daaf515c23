//! Backend registry
//!
//! Discovers the available backends once, hands out shared instances and
//! tracks which kind is active.
//!
//! The reference backend is always registered. Optional kinds come from a
//! static factory table: each factory has an availability probe (driven by
//! [`BackendConfig`]) and a constructor. A factory that is unavailable or
//! fails to construct is logged and skipped; it never fails initialization.
//!
//! ```ignore
//! let registry = BackendRegistry::new(BackendConfig::from_env());
//! registry.initialize().await;
//! let best = registry.benchmark_and_select_best().await;
//! let backend = registry.active_backend().await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use motionpool_core::BackendConfig;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OnceCell};

use crate::backend::{BackendKind, MotionBackend, Result};
use crate::benchmark::{self, BenchmarkReport};
use crate::reference::ReferenceBackend;
use crate::remote::RemoteBackend;

// ============================================================================
// Factories
// ============================================================================

/// Constructor entry in the backend table
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Kind of backend this factory produces
    fn kind(&self) -> BackendKind;

    /// Cheap availability probe; `create` is only attempted when this is true
    fn is_available(&self, config: &BackendConfig) -> bool;

    async fn create(&self, config: &BackendConfig) -> Result<Arc<dyn MotionBackend>>;
}

/// Native backend factory (rayon batch execution)
#[cfg(feature = "native")]
#[derive(Debug, Default)]
pub struct NativeFactory;

#[cfg(feature = "native")]
#[async_trait]
impl BackendFactory for NativeFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn is_available(&self, config: &BackendConfig) -> bool {
        !config.disable_native
    }

    async fn create(&self, _config: &BackendConfig) -> Result<Arc<dyn MotionBackend>> {
        let backend = crate::native::NativeBackend::new(0)?;
        Ok(Arc::new(backend))
    }
}

/// Remote math service factory; probes the health endpoint
#[derive(Debug, Default)]
pub struct RemoteFactory;

#[async_trait]
impl BackendFactory for RemoteFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn is_available(&self, config: &BackendConfig) -> bool {
        config.remote_url.is_some()
    }

    async fn create(&self, config: &BackendConfig) -> Result<Arc<dyn MotionBackend>> {
        let url = config.remote_url.as_deref().unwrap_or_default();
        let backend = RemoteBackend::connect(url, config.remote_timeout).await?;
        Ok(Arc::new(backend))
    }
}

/// The built-in factory table, in preference order
pub fn default_factories() -> Vec<Arc<dyn BackendFactory>> {
    let mut factories: Vec<Arc<dyn BackendFactory>> = Vec::new();
    #[cfg(feature = "native")]
    factories.push(Arc::new(NativeFactory));
    factories.push(Arc::new(RemoteFactory));
    factories
}

// ============================================================================
// Registry
// ============================================================================

pub struct BackendRegistry {
    config: BackendConfig,
    factories: Vec<Arc<dyn BackendFactory>>,
    backends: OnceCell<HashMap<BackendKind, Arc<dyn MotionBackend>>>,
    active: RwLock<BackendKind>,
    /// Serializes benchmark runs
    bench_lock: Mutex<()>,
    last_report: RwLock<Option<BenchmarkReport>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("initialized", &self.backends.initialized())
            .field("registered", &self.registered_kinds())
            .field("active", &self.active_kind())
            .finish()
    }
}

impl BackendRegistry {
    /// Registry with the built-in factory table
    pub fn new(config: BackendConfig) -> Self {
        Self::with_factories(config, default_factories())
    }

    /// Registry with a custom factory table
    pub fn with_factories(config: BackendConfig, factories: Vec<Arc<dyn BackendFactory>>) -> Self {
        Self {
            config,
            factories,
            backends: OnceCell::new(),
            active: RwLock::new(BackendKind::Reference),
            bench_lock: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Discover and construct backends
    ///
    /// Idempotent; concurrent callers await the same in-flight initialization.
    pub async fn initialize(&self) {
        self.backends().await;
    }

    pub fn is_initialized(&self) -> bool {
        self.backends.initialized()
    }

    async fn backends(&self) -> &HashMap<BackendKind, Arc<dyn MotionBackend>> {
        self.backends.get_or_init(|| self.discover()).await
    }

    async fn discover(&self) -> HashMap<BackendKind, Arc<dyn MotionBackend>> {
        let mut backends: HashMap<BackendKind, Arc<dyn MotionBackend>> = HashMap::new();
        backends.insert(BackendKind::Reference, Arc::new(ReferenceBackend::new()));

        for factory in &self.factories {
            let kind = factory.kind();
            if backends.contains_key(&kind) {
                continue;
            }
            if !factory.is_available(&self.config) {
                tracing::debug!(backend = %kind, "Backend not available, skipping");
                continue;
            }
            match factory.create(&self.config).await {
                Ok(backend) => {
                    tracing::info!(backend = %kind, "Backend registered");
                    backends.insert(kind, backend);
                }
                Err(e) => {
                    tracing::warn!(backend = %kind, error = %e, "Backend construction failed, skipping");
                }
            }
        }

        let preferred = BackendKind::PREFERENCE_ORDER
            .into_iter()
            .find(|k| backends.contains_key(k))
            .unwrap_or(BackendKind::Reference);
        *self.active.write() = preferred;
        tracing::info!(
            active = %preferred,
            registered = backends.len(),
            "Backend registry initialized"
        );

        backends
    }

    /// Registered kinds in preference order (empty before initialization)
    pub fn registered_kinds(&self) -> Vec<BackendKind> {
        match self.backends.get() {
            Some(backends) => BackendKind::PREFERENCE_ORDER
                .into_iter()
                .filter(|k| backends.contains_key(k))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_registered(&self, kind: BackendKind) -> bool {
        self.backends
            .get()
            .map(|b| b.contains_key(&kind))
            .unwrap_or(false)
    }

    /// Backend for `kind`, or the active backend when `kind` is unavailable
    pub async fn get_backend(&self, kind: BackendKind) -> Arc<dyn MotionBackend> {
        let backends = self.backends().await;
        if let Some(backend) = backends.get(&kind) {
            return Arc::clone(backend);
        }

        let active = self.active_kind();
        tracing::warn!(
            requested = %kind,
            fallback = %active,
            "Requested backend unavailable, using active backend"
        );
        self.lookup(backends, active)
    }

    /// The currently active backend
    pub async fn active_backend(&self) -> Arc<dyn MotionBackend> {
        let backends = self.backends().await;
        self.lookup(backends, self.active_kind())
    }

    fn lookup(
        &self,
        backends: &HashMap<BackendKind, Arc<dyn MotionBackend>>,
        kind: BackendKind,
    ) -> Arc<dyn MotionBackend> {
        backends
            .get(&kind)
            .or_else(|| backends.get(&BackendKind::Reference))
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(ReferenceBackend::new()))
    }

    pub fn active_kind(&self) -> BackendKind {
        *self.active.read()
    }

    /// Override the active kind; returns false when `kind` is not registered
    pub async fn set_active_kind(&self, kind: BackendKind) -> bool {
        let backends = self.backends().await;
        if !backends.contains_key(&kind) {
            tracing::warn!(backend = %kind, "Cannot activate unregistered backend");
            return false;
        }
        *self.active.write() = kind;
        tracing::info!(backend = %kind, "Active backend changed");
        true
    }

    /// Time every registered backend and activate the best scorer
    ///
    /// With only the reference backend registered this returns immediately
    /// without timed runs. Runs are serialized and the active kind is only
    /// written after all of them complete.
    pub async fn benchmark_and_select_best(&self) -> BackendKind {
        self.benchmark().await.selected
    }

    /// Like [`benchmark_and_select_best`](Self::benchmark_and_select_best), returning the full report
    pub async fn benchmark(&self) -> BenchmarkReport {
        let _guard = self.bench_lock.lock().await;
        let backends = self.backends().await;

        if backends.len() <= 1 {
            tracing::debug!("Only the reference backend is registered, skipping benchmark");
            let report = BenchmarkReport {
                selected: BackendKind::Reference,
                scores: Vec::new(),
            };
            *self.active.write() = BackendKind::Reference;
            *self.last_report.write() = Some(report.clone());
            return report;
        }

        let battery = benchmark::default_battery();
        let mut scores = Vec::with_capacity(backends.len());
        for kind in self.registered_kinds() {
            if let Some(backend) = backends.get(&kind) {
                let score =
                    benchmark::benchmark_backend(backend.as_ref(), &battery, self.config.bench_iterations)
                        .await;
                tracing::info!(backend = %kind, score = score.score, "Backend benchmarked");
                scores.push(score);
            }
        }

        let selected = benchmark::select_best(&scores).unwrap_or(BackendKind::Reference);
        *self.active.write() = selected;
        tracing::info!(backend = %selected, "Selected fastest backend");

        let report = BenchmarkReport { selected, scores };
        *self.last_report.write() = Some(report.clone());
        report
    }

    /// Report from the most recent benchmark run
    pub fn last_report(&self) -> Option<BenchmarkReport> {
        self.last_report.read().clone()
    }
}
