use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use crate::load_generator::{self, LoadPlan};
use crate::AppState;

use super::AppError;

#[derive(Debug, Serialize)]
pub struct LoadStatus {
    pub running: bool,
    /// Plan of the run in progress, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<LoadPlan>,
    /// Distinct method keys timed so far.
    pub timers: usize,
}

impl LoadStatus {
    fn of(state: &AppState, plan: Option<LoadPlan>) -> Self {
        Self {
            running: state.load_running.load(Ordering::SeqCst),
            plan,
            timers: state.monitor.interceptor.registry().len(),
        }
    }
}

// ─── POST /api/load/start ────────────────────────────────────────

pub async fn start_load(
    State(state): State<Arc<AppState>>,
    Json(plan): Json<LoadPlan>,
) -> Result<Json<LoadStatus>, AppError> {
    if let Some(problem) = plan.problem() {
        return Err(AppError::BadRequest(problem));
    }

    // one run at a time
    if state
        .load_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(AppError::AlreadyRunning);
    }

    info!(
        concurrency = plan.concurrency,
        duration_secs = plan.duration_secs,
        read_pct = plan.read_pct,
        "load generator starting"
    );

    let handle = tokio::spawn(load_generator::run(
        state.load_running.clone(),
        state.users.clone(),
        state.products.clone(),
        plan,
    ));
    *state.load_handle.lock().await = Some(handle);

    Ok(Json(LoadStatus::of(&state, Some(plan))))
}

// ─── POST /api/load/stop ─────────────────────────────────────────

pub async fn stop_load(State(state): State<Arc<AppState>>) -> Json<LoadStatus> {
    state.load_running.store(false, Ordering::SeqCst);

    if let Some(handle) = state.load_handle.lock().await.take() {
        if let Err(e) = handle.await {
            info!(error = %e, "load generator task ended abnormally");
        }
        info!("load generator stopped");
    }

    Json(LoadStatus::of(&state, None))
}

// ─── GET /api/load/status ────────────────────────────────────────

pub async fn load_status(State(state): State<Arc<AppState>>) -> Json<LoadStatus> {
    Json(LoadStatus::of(&state, None))
}
