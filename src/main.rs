use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use rust_call_monitor::monitor::MonotonicClock;
use rust_call_monitor::runtime_info::SysinfoProvider;
use rust_call_monitor::services::{ProductService, UserService};
use rust_call_monitor::settings::Settings;
use rust_call_monitor::{redis_client, seed, server, telemetry, AppState, MonitorState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration & logging ───────────────────────────────
    let config_path = std::env::var_os("CALL_MONITOR_CONFIG").map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("loading settings")?;
    telemetry::init(&settings.log)?;

    info!(
        warn_threshold = settings.monitor.warn_threshold,
        service_patterns = ?settings.monitor.service_patterns,
        http_methods = ?settings.monitor.http_methods,
        "call monitor starting"
    );

    // ── 2. Monitor ───────────────────────────────────────────────
    let provider = Arc::new(SysinfoProvider::new().context("reading process id")?);
    let monitor = MonitorState::from_settings(
        &settings.monitor,
        provider,
        Arc::new(MonotonicClock::new()),
    )?;

    // ── 3. Connect to Redis & seed ───────────────────────────────
    let redis_conn = redis_client::connect(&settings.server.redis_url)
        .await
        .with_context(|| format!("connecting to redis at {}", settings.server.redis_url))?;
    info!(url = %settings.server.redis_url, "connected to redis");

    if settings.server.seed {
        if let Err(e) = seed::seed(&redis_conn).await {
            warn!(error = %e, "seeding demo data failed; continuing with existing data");
        }
    }

    // ── 4. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState {
        users: UserService::new(redis_conn.clone(), monitor.interceptor.clone()),
        products: ProductService::new(redis_conn, monitor.interceptor.clone()),
        monitor,
        load_running: Arc::new(AtomicBool::new(false)),
        load_handle: tokio::sync::Mutex::new(None),
    });

    // ── 5. Bind & serve ──────────────────────────────────────────
    let app = server::create_router(state);
    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.server.bind_addr))?;

    info!(addr = %settings.server.bind_addr, "listening");
    axum::serve(listener, app).await.context("server exited with error")?;
    Ok(())
}
