use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub mod error;
pub mod handlers;
pub mod load_generator;
pub mod middleware;
pub mod monitor;
pub mod redis_client;
pub mod runtime_info;
pub mod seed;
pub mod server;
pub mod services;
pub mod settings;
pub mod telemetry;

use monitor::{
    Clock, DiagnosticSink, FanoutSink, Interceptor, RecentBreaches, ThresholdLogger,
    TimerRegistry, TracingSink,
};
use runtime_info::RuntimeMetricsProvider;
use services::{ProductService, UserService};
use settings::{MonitorSettings, SettingsError};

/// Everything the monitoring endpoints need. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MonitorState {
    /// Shared by every route layer and service.
    pub interceptor: Arc<Interceptor>,
    /// Latest breach records, also written to the log.
    pub breaches: Arc<RecentBreaches>,
}

impl MonitorState {
    /// Wire registry, threshold, sinks and match policy from settings.
    pub fn from_settings(
        settings: &MonitorSettings,
        provider: Arc<dyn RuntimeMetricsProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SettingsError> {
        let threshold = Arc::new(settings.threshold()?);
        let policy = settings.match_policy()?;

        let breaches = Arc::new(settings.breach_buffer()?);
        let sinks: Vec<Arc<dyn DiagnosticSink>> = vec![Arc::new(TracingSink), breaches.clone()];
        let logger = ThresholdLogger::new(threshold, provider, Arc::new(FanoutSink::new(sinks)));

        let registry = Arc::new(TimerRegistry::new(clock));
        Ok(Self {
            interceptor: Arc::new(Interceptor::new(registry, logger, policy)),
            breaches,
        })
    }
}

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    pub monitor: MonitorState,

    /// Instrumented service layer.
    pub users: UserService,
    pub products: ProductService,

    /// Flag checked by every load-generator worker on each iteration.
    pub load_running: Arc<AtomicBool>,

    /// Handle to the spawned load-generator task so we can await clean shutdown.
    pub load_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}
