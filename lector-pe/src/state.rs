//! Shared session state
//!
//! Thread-safe read view of the session for API handlers and SSE clients.
//! The session actor is the only writer; everything here mirrors state the
//! actor owns, so handlers never need to round-trip through the actor inbox
//! for a read.

use lector_common::events::{EngineEvent, EventBus, SegmentState, SessionStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{broadcast, RwLock};

/// One transcript entry as exposed to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    /// Human-readable content of this unit
    pub text: String,
    /// Playback state of this unit
    pub state: SegmentState,
}

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with writes only from the
/// session actor; counters that change on every segment use atomics.
pub struct SharedState {
    /// Coarse session lifecycle flag
    session_status: RwLock<SessionStatus>,

    /// Last transport/server-reported failure, for UIs that want to
    /// distinguish an aborted session from a user-stopped one
    last_error: RwLock<Option<String>>,

    /// Pending queue backlog size
    queue_len: AtomicUsize,

    /// Transcript pointer (ordinal of the segment playing or about to play)
    current_index: AtomicUsize,

    /// Transcript entries in arrival order
    transcript: RwLock<Vec<TranscriptEntry>>,

    /// Event broadcaster for SSE events
    events: EventBus,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        Self {
            session_status: RwLock::new(SessionStatus::Idle),
            last_error: RwLock::new(None),
            queue_len: AtomicUsize::new(0),
            current_index: AtomicUsize::new(0),
            transcript: RwLock::new(Vec::new()),
            events: EventBus::new(100),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: EngineEvent) {
        // No receivers is OK
        self.events.emit_lossy(event);
    }

    /// Subscribe to the event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Get current session status
    pub async fn get_session_status(&self) -> SessionStatus {
        *self.session_status.read().await
    }

    /// Set session status
    pub async fn set_session_status(&self, status: SessionStatus) {
        *self.session_status.write().await = status;
    }

    /// Get the last recorded transport error, if any
    pub async fn get_last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Record or clear the last transport error
    pub async fn set_last_error(&self, error: Option<String>) {
        *self.last_error.write().await = error;
    }

    /// Pending queue backlog size
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Transcript pointer
    pub fn current_index(&self) -> usize {
        self.current_index.load(Ordering::Relaxed)
    }

    pub fn set_current_index(&self, index: usize) {
        self.current_index.store(index, Ordering::Relaxed);
    }

    /// Append a transcript entry (state `Pending`)
    pub async fn push_transcript_entry(&self, text: String) {
        self.transcript.write().await.push(TranscriptEntry {
            text,
            state: SegmentState::Pending,
        });
    }

    /// Update the state of one transcript entry; no-op if out of range
    pub async fn set_transcript_entry_state(&self, index: usize, state: SegmentState) {
        if let Some(entry) = self.transcript.write().await.get_mut(index) {
            entry.state = state;
        }
    }

    /// Number of transcript entries
    pub async fn transcript_len(&self) -> usize {
        self.transcript.read().await.len()
    }

    /// Snapshot of the transcript for the API
    pub async fn transcript_snapshot(&self) -> Vec<TranscriptEntry> {
        self.transcript.read().await.clone()
    }

    /// Reset all session-scoped state (new session)
    pub async fn reset_session(&self) {
        self.transcript.write().await.clear();
        self.set_queue_len(0);
        self.set_current_index(0);
        self.set_last_error(None).await;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
