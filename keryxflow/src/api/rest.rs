//! REST surface: status, positions, trades, balance as reads;
//! panic and pause as the only writes. All routes are authenticated except
//! nothing is public here — even status requires a token once one is
//! configured, since the surface exposes live trading state.

use super::auth::AuthBearer;
use super::state::AppState;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(status))
        .route("/api/positions", get(positions))
        .route("/api/trades", get(trades))
        .route("/api/balance", get(balance))
        .route("/api/panic", post(panic))
        .route("/api/pause", post(pause))
        .route("/api/ws", get(super::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResponse {
    state: String,
    stats: crate::stats::EngineStatsSnapshot,
}

async fn status(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = StatusResponse {
        state: state.engine.state().to_string(),
        stats: state.engine.stats().snapshot(),
    };
    Json(resp)
}

async fn positions(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.store().open_positions())
}

async fn trades(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.store().recent_trades(50))
}

#[derive(Serialize)]
struct BalanceResponse {
    total: rust_decimal::Decimal,
    free: rust_decimal::Decimal,
    locked: rust_decimal::Decimal,
}

async fn balance(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.snapshot();
    Json(BalanceResponse {
        total: snapshot.total_value,
        free: snapshot.cash_free,
        locked: snapshot.cash_locked,
    })
}

#[derive(Serialize)]
struct ControlResponse {
    state: String,
    message: String,
}

/// Idempotent — closes all open positions and halts new entries, no
/// matter how many times it's called or what state the engine was in.
async fn panic(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.trigger_panic().await;
    info!("panic triggered via API");
    Json(ControlResponse {
        state: state.engine.state().to_string(),
        message: "all positions closed, engine paused".to_string(),
    })
}

/// Toggles pause/resume. Ticks and trailing keep running while paused;
/// only new-entry processing halts.
async fn pause(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let new_state = state.engine.toggle_pause().await;
    info!(state = %new_state, "pause toggled via API");
    Json(ControlResponse {
        state: new_state.to_string(),
        message: "pause state toggled".to_string(),
    })
}
