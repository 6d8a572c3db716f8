use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::middleware::{monitor_requests, RouteMonitor};
use crate::{AppState, MonitorState};

/// Builds the full Axum `Router`: instrumented demo API, load control and
/// the monitoring endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    let interceptor = state.monitor.interceptor.clone();

    // ── User endpoints ──────────────────────────────────────────
    let users = Router::new()
        .route(
            "/api/users/:id",
            get(handlers::users::get_user).delete(handlers::users::delete_user),
        )
        .route("/api/users", post(handlers::users::create_user))
        .route_layer(from_fn_with_state(
            RouteMonitor::new(interceptor.clone(), "UserController"),
            monitor_requests,
        ));

    // ── Product endpoints ───────────────────────────────────────
    let products = Router::new()
        .route("/api/products/:id", get(handlers::products::get_product))
        .route(
            "/api/products/:id/stock",
            put(handlers::products::adjust_stock),
        )
        .route_layer(from_fn_with_state(
            RouteMonitor::new(interceptor, "ProductController"),
            monitor_requests,
        ));

    // ── Load control (not instrumented) ─────────────────────────
    let load = Router::new()
        .route("/api/load/start", post(handlers::load::start_load))
        .route("/api/load/stop", post(handlers::load::stop_load))
        .route("/api/load/status", get(handlers::load::load_status));

    users
        .merge(products)
        .merge(load)
        .with_state(state.clone())
        .merge(monitor_router(state.monitor.clone()))
        .layer(CorsLayer::permissive())
}

/// Monitoring endpoints. Needs no redis, so it can be served on its own.
pub fn monitor_router(state: MonitorState) -> Router {
    Router::new()
        .route("/api/monitor/timers", get(handlers::monitor::get_timers))
        .route("/api/monitor/stream", get(handlers::monitor::timers_stream))
        .route("/api/monitor/breaches", get(handlers::monitor::get_breaches))
        .route("/api/monitor/runtime", get(handlers::monitor::get_runtime))
        .route(
            "/api/monitor/threshold",
            get(handlers::monitor::get_threshold).put(handlers::monitor::put_threshold),
        )
        .with_state(state)
}
