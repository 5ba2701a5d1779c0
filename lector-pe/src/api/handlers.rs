//! HTTP request handlers
//!
//! Implements the control surface, read endpoints, and the arrival-feed
//! ingest adapter.

use crate::api::AppState;
use crate::feed::{self, ArrivalEvent};
use crate::state::TranscriptEntry;
use axum::{extract::State, http::StatusCode, Json};
use lector_common::events::SessionStatus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Full text of the source document
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    status: SessionStatus,
    queue_length: usize,
    current_index: usize,
    last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    current_index: usize,
    segments: Vec<TranscriptEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

fn internal_error(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ============================================================================
// Session Control Surface
// ============================================================================

/// POST /session/start - begin a new read-aloud session
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<AckResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.content.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Document content is empty".to_string(),
            }),
        ));
    }

    info!(bytes = request.content.len(), "Session start requested");

    state
        .engine
        .start(request.content)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(AckResponse {
        status: "processing".to_string(),
    }))
}

/// POST /playback/skip - cancel the currently audible segment
pub async fn skip(
    State(state): State<AppState>,
) -> Result<Json<AckResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .skip()
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(AckResponse {
        status: "ok".to_string(),
    }))
}

/// POST /playback/stop - cancel the whole session
pub async fn stop(
    State(state): State<AppState>,
) -> Result<Json<AckResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .stop()
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(AckResponse {
        status: "ok".to_string(),
    }))
}

// ============================================================================
// Read Endpoints
// ============================================================================

/// GET /session/status - session lifecycle flag plus backlog counters
pub async fn get_status(State(state): State<AppState>) -> Json<SessionStatusResponse> {
    Json(SessionStatusResponse {
        status: state.state.get_session_status().await,
        queue_length: state.state.queue_len(),
        current_index: state.state.current_index(),
        last_error: state.state.get_last_error().await,
    })
}

/// GET /session/transcript - transcript entries in arrival order
pub async fn get_transcript(State(state): State<AppState>) -> Json<TranscriptResponse> {
    Json(TranscriptResponse {
        current_index: state.state.current_index(),
        segments: state.state.transcript_snapshot().await,
    })
}

// ============================================================================
// Arrival Feed Ingest
// ============================================================================

/// POST /feed/event - one feed event, forwarded in arrival order
///
/// The body is the raw wire event (`{"type":"text"|"audio"|"error", ...}`).
/// A malformed payload aborts the session the same way a transport error
/// does, then reports 400 to the sender.
pub async fn feed_event(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<AckResponse>, (StatusCode, Json<ErrorResponse>)> {
    let event = match feed::parse_feed_event(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Malformed feed event: {}", e);
            let _ = state
                .engine
                .feed_event(ArrivalEvent::TransportError(e.to_string()));
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ));
        }
    };

    state
        .engine
        .feed_event(event)
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(AckResponse {
        status: "ok".to_string(),
    }))
}

/// POST /feed/close - the feed has no more input
pub async fn feed_close(
    State(state): State<AppState>,
) -> Result<Json<AckResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .feed_event(ArrivalEvent::Closed)
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(AckResponse {
        status: "ok".to_string(),
    }))
}
