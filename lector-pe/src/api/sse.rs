//! Server-Sent Events (SSE) broadcaster
//!
//! Streams real-time engine events to connected clients.

use crate::api::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::{Stream, StreamExt};
use lector_common::events::EngineEvent;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe to event broadcast
    let rx = state.state.subscribe_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    let event_type = event_type_str(&event);
                    debug!("Broadcasting SSE event: {}", event_type);

                    Some(Ok(Event::default().event(event_type).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // BroadcastStream error (lagged or closed)
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Extract the event type string for the SSE event field
fn event_type_str(event: &EngineEvent) -> &'static str {
    match event {
        EngineEvent::SessionStatusChanged { .. } => "SessionStatusChanged",
        EngineEvent::SegmentTextReceived { .. } => "SegmentTextReceived",
        EngineEvent::SegmentStarted { .. } => "SegmentStarted",
        EngineEvent::SegmentFinished { .. } => "SegmentFinished",
        EngineEvent::QueueChanged { .. } => "QueueChanged",
    }
}
