//! Event types for the Lector event system
//!
//! Provides shared event definitions and the EventBus used by the playback
//! engine and any UI module subscribed to it.
//!
//! # Architecture
//!
//! Lector uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting
//! - **Command channels** (tokio::mpsc): request → single handler
//! - **Shared state** (Arc<RwLock<T>>): read-heavy access

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Coarse session lifecycle flag exposed to the surrounding UI.
///
/// Created `Idle`; moves to `Uploading` when a source document begins
/// transmission; to `Processing` once the outbound payload is accepted and
/// the feed starts returning segments; to `Completed` when the feed has
/// delivered everything and every transcript entry has finished playing.
/// Reverts to `Idle` on transport failure or user stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Uploading,
    Processing,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Uploading => write!(f, "uploading"),
            SessionStatus::Processing => write!(f, "processing"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Playback state of a single transcript segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentState {
    /// Received, audio not yet played
    Pending,
    /// Currently audible (at most one segment session-wide)
    Playing,
    /// Audio reached its natural end
    Played,
    /// Cancelled by the user mid-playback
    Skipped,
    /// Audio could not be decoded or played
    Failed,
}

impl SegmentState {
    /// Whether this segment is finished for completion purposes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SegmentState::Played | SegmentState::Skipped | SegmentState::Failed
        )
    }
}

/// How a segment stopped being current.
///
/// All three outcomes advance the transcript pointer by exactly one and
/// count as "played" for session completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentOutcome {
    Played,
    Skipped,
    Failed,
}

impl From<SegmentOutcome> for SegmentState {
    fn from(outcome: SegmentOutcome) -> Self {
        match outcome {
            SegmentOutcome::Played => SegmentState::Played,
            SegmentOutcome::Skipped => SegmentState::Skipped,
            SegmentOutcome::Failed => SegmentState::Failed,
        }
    }
}

impl std::fmt::Display for SegmentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentOutcome::Played => write!(f, "played"),
            SegmentOutcome::Skipped => write!(f, "skipped"),
            SegmentOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Lector engine event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events use this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Session lifecycle flag changed
    ///
    /// Triggers:
    /// - SSE: update status banner / re-enable upload controls
    SessionStatusChanged {
        /// Status before change
        old_status: SessionStatus,
        /// Status after change
        new_status: SessionStatus,
        /// When status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A transcript text unit arrived from the feed
    ///
    /// Triggers:
    /// - SSE: append the entry to the live transcript view
    SegmentTextReceived {
        /// Ordinal of the new entry (0-based arrival order)
        index: usize,
        /// Human-readable content of the entry
        text: String,
        /// When the entry was appended
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A segment's audio started playing
    ///
    /// Triggers:
    /// - SSE: highlight the current transcript entry
    SegmentStarted {
        /// Ordinal of the segment now audible
        index: usize,
        /// When playback started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A segment stopped being current (natural end, skip, or failure)
    ///
    /// Triggers:
    /// - SSE: dim the finished entry, advance the highlight
    SegmentFinished {
        /// Ordinal of the finished segment
        index: usize,
        /// Why the segment finished
        outcome: SegmentOutcome,
        /// When the segment finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pending queue length changed
    ///
    /// Triggers:
    /// - SSE: update the "N in queue" backlog badge
    QueueChanged {
        /// Number of audio payloads awaiting playback
        length: usize,
        /// When the queue changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity.
    ///
    /// `capacity` is the number of events buffered before old events are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    pub fn emit(
        &self,
        event: EngineEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<EngineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscribers case.
    ///
    /// Used for routine events (queue badges, progress) where a missing
    /// listener is normal.
    pub fn emit_lossy(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ========================================
// Tests
// ========================================
