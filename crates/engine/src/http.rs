//! Minimal HTTP surface (ambient stack): a `/healthz` liveness probe and the
//! axum `Router` that mounts it alongside the websocket upgrade route in
//! [`crate::ws`]. HTTP routing beyond hosting the websocket upgrade is out
//! of scope for this system, but a bare `axum::serve` with no liveness
//! check at all would be unusual for a service in this corpus, so one route
//! is carried through as ambient infrastructure.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_sessions: usize,
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.sessions.active_session_count(),
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(crate::ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}
