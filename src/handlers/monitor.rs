use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::info;

use crate::monitor::{BreachRecord, MethodKey, TimerSnapshot};
use crate::runtime_info::{RuntimeMetricsProvider, RuntimeMetricsSnapshot};
use crate::MonitorState;

use super::AppError;

#[derive(Debug, Serialize)]
pub struct TimerView {
    pub key: MethodKey,
    #[serde(flatten)]
    pub snapshot: TimerSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThresholdBody {
    pub warn_threshold: f64,
}

#[derive(Debug, Serialize)]
pub struct ThresholdUpdated {
    pub warn_threshold: f64,
    pub previous: f64,
}

fn timer_views(state: &MonitorState) -> Vec<TimerView> {
    state
        .interceptor
        .registry()
        .snapshot()
        .into_iter()
        .map(|(key, snapshot)| TimerView { key, snapshot })
        .collect()
}

// ─── GET /api/monitor/timers ─────────────────────────────────────

pub async fn get_timers(State(state): State<MonitorState>) -> Json<Vec<TimerView>> {
    Json(timer_views(&state))
}

// ─── GET /api/monitor/stream ─────────────────────────────────────

/// Server-Sent Events: every timer's snapshot as JSON every 500 ms.
pub async fn timers_stream(
    State(state): State<MonitorState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(500));

    let stream = IntervalStream::new(interval).map(move |_| {
        let json = serde_json::to_string(&timer_views(&state)).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// ─── GET /api/monitor/breaches ───────────────────────────────────

pub async fn get_breaches(State(state): State<MonitorState>) -> Json<Vec<BreachRecord>> {
    Json(state.breaches.records())
}

// ─── GET /api/monitor/runtime ────────────────────────────────────

pub async fn get_runtime(
    State(state): State<MonitorState>,
) -> Result<Json<RuntimeMetricsSnapshot>, AppError> {
    let provider = state.interceptor.logger().provider().clone();
    let snapshot = tokio::task::spawn_blocking(move || provider.snapshot())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(Json(snapshot))
}

// ─── GET /api/monitor/threshold ──────────────────────────────────

pub async fn get_threshold(State(state): State<MonitorState>) -> Json<ThresholdBody> {
    Json(ThresholdBody {
        warn_threshold: state.interceptor.logger().threshold().get(),
    })
}

// ─── PUT /api/monitor/threshold ──────────────────────────────────

pub async fn put_threshold(
    State(state): State<MonitorState>,
    Json(body): Json<ThresholdBody>,
) -> Result<Json<ThresholdUpdated>, AppError> {
    let previous = state
        .interceptor
        .logger()
        .threshold()
        .set(body.warn_threshold)?;
    info!(previous, current = body.warn_threshold, "warn threshold updated");
    Ok(Json(ThresholdUpdated {
        warn_threshold: body.warn_threshold,
        previous,
    }))
}
