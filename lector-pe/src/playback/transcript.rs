//! Transcript synchronization
//!
//! Keeps the arrival-ordered list of segments and the pointer to the one
//! currently audible. The pointer only ever increases; it advances by
//! exactly one each time an audio unit finishes, whatever the reason, and
//! may exceed the transcript length momentarily right after the last unit
//! finishes (the completion trigger).
//!
//! Text and audio for the same ordinal are not required to arrive together,
//! so pointer operations tolerate a missing entry (audio ahead of text) by
//! marking nothing but still advancing.

use lector_common::events::{SegmentOutcome, SegmentState, SessionStatus};

/// One text+audio unit of the transcript.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Human-readable content of this unit
    pub text: String,
    /// Playback state of this unit
    pub state: SegmentState,
}

/// Arrival-ordered segments plus the playback pointer.
pub struct Transcript {
    entries: Vec<Segment>,
    current_index: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current_index: 0,
        }
    }

    /// Append a new segment (state `Pending`) at the tail.
    ///
    /// Returns the ordinal of the new entry.
    pub fn append(&mut self, text: String) -> usize {
        self.entries.push(Segment {
            text,
            state: SegmentState::Pending,
        });
        self.entries.len() - 1
    }

    /// Mark the current entry as audible; no-op if its text has not arrived
    /// yet.
    pub fn mark_current_playing(&mut self) {
        if let Some(segment) = self.entries.get_mut(self.current_index) {
            segment.state = SegmentState::Playing;
        }
    }

    /// Undo a `Playing` mark without advancing (session stop).
    ///
    /// Returns true if the current entry was marked audible.
    pub fn reset_current_playing(&mut self) -> bool {
        if let Some(segment) = self.entries.get_mut(self.current_index) {
            if segment.state == SegmentState::Playing {
                segment.state = SegmentState::Pending;
                return true;
            }
        }
        false
    }

    /// Record the outcome of the current entry (if present) and advance the
    /// pointer by exactly one.
    pub fn mark_current_finished(&mut self, outcome: SegmentOutcome) {
        if let Some(segment) = self.entries.get_mut(self.current_index) {
            segment.state = outcome.into();
        }
        self.current_index += 1;
    }

    /// Pointer to the segment playing or about to play.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Segment] {
        &self.entries
    }

    /// Whether the whole session has finished.
    ///
    /// True iff the pending queue is empty, at least one segment arrived,
    /// every segment reached a terminal state, and the feed was actively
    /// delivering (`Processing`).
    pub fn is_session_complete(&self, queue_empty: bool, status: SessionStatus) -> bool {
        queue_empty
            && status == SessionStatus::Processing
            && !self.entries.is_empty()
            && self.entries.iter().all(|s| s.state.is_terminal())
    }

    /// Drop all entries and rewind the pointer (new session).
    pub fn reset(&mut self) {
        self.entries.clear();
        self.current_index = 0;
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
