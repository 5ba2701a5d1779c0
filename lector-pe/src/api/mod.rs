//! REST API implementation for the Playback Engine
//!
//! Exposes the control surface (start/skip/stop), read endpoints for the
//! surrounding UI, the arrival-feed ingest adapter, and the SSE event
//! stream.

pub mod handlers;
pub mod sse;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::playback::engine::EngineHandle;
use crate::state::SharedState;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session engine handle
    pub engine: EngineHandle,
    /// Shared read view of the session
    pub state: Arc<SharedState>,
    /// Server port
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Session control surface
                .route("/session/start", post(handlers::start_session))
                .route("/session/status", get(handlers::get_status))
                .route("/session/transcript", get(handlers::get_transcript))
                // Playback control
                .route("/playback/skip", post(handlers::skip))
                .route("/playback/stop", post(handlers::stop))
                // Arrival feed ingest
                .route("/feed/event", post(handlers::feed_event))
                .route("/feed/close", post(handlers::feed_close))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "lector-pe",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
    }))
}
