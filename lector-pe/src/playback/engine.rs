//! Session engine - sequential playback orchestration
//!
//! One actor task owns every piece of mutable session state: the pending
//! queue, the transcript, the playback controller slot, and the session
//! status. All mutations happen in reaction to messages drained from a
//! single inbox - feed arrivals, control commands, decode results, and
//! playback-finished notifications - so no two mutations ever interleave.
//!
//! The controller moves `Idle -> Decoding -> Playing -> Idle`. Natural end,
//! skip, decode failure, and playback failure all route through one
//! `finish_current` procedure: release the clip, remove the queue head,
//! record the outcome, advance the pointer by exactly one, return to
//! `Idle`, and re-evaluate. Asynchronous completions re-enter the inbox
//! tagged with the playback sequence number they belong to; a message whose
//! tag no longer matches the in-flight playback is stale and dropped, which
//! is what suppresses the natural-completion signal after a skip.

use crate::audio::{AudioBackend, AudioClip, StopHandle};
use crate::feed::ArrivalEvent;
use crate::outbound::OutboundMessage;
use crate::playback::queue::PendingQueue;
use crate::playback::transcript::Transcript;
use crate::state::SharedState;
use crate::{Error, Result};
use lector_common::events::{EngineEvent, SegmentOutcome, SegmentState, SessionStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Playback controller state. Mutual exclusion of playbacks is structural:
/// `try_advance` refuses to act unless the controller is `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerState {
    Idle,
    Decoding,
    Playing,
}

/// The single in-flight clip. At most one exists; acquisition and release
/// are explicit, and release tolerates an already-ended clip.
struct ActiveClip {
    seq: u64,
    stop: StopHandle,
}

/// Messages processed by the session actor, one at a time.
enum EngineCommand {
    Start {
        document: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Skip,
    Stop,
    Feed(ArrivalEvent),
    DecodeComplete {
        seq: u64,
        result: Result<AudioClip>,
    },
    PlaybackFinished {
        seq: u64,
        result: Result<()>,
    },
}

/// Cloneable handle used by the API layer and background adapters to talk
/// to the session actor.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Begin a new session: reset all session state, submit the document,
    /// and start consuming the feed.
    pub async fn start(&self, document: String) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::Start {
            document,
            reply: reply_tx,
        })?;
        reply_rx
            .await
            .map_err(|_| Error::Session("Engine dropped start request".to_string()))?
    }

    /// Cancel the currently audible segment. No-op when nothing is playing.
    pub fn skip(&self) -> Result<()> {
        self.send(EngineCommand::Skip)
    }

    /// Cancel the whole session: clear the queue, release the active clip,
    /// and return to `Idle`.
    pub fn stop(&self) -> Result<()> {
        self.send(EngineCommand::Stop)
    }

    /// Deliver one arrival-feed event, in arrival order.
    pub fn feed_event(&self, event: ArrivalEvent) -> Result<()> {
        self.send(EngineCommand::Feed(event))
    }

    fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| Error::Session("Session engine is not running".to_string()))
    }
}

/// Session engine - owns the pending queue, transcript, and the playback
/// controller slot.
pub struct SessionEngine {
    /// Shared read view mirrored for API handlers
    state: Arc<SharedState>,

    /// Decode/playback capability
    backend: Arc<dyn AudioBackend>,

    /// Outbound channel toward the synthesis service
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,

    /// Inbox sender for decode/playback completions from spawned tasks
    inbox_tx: mpsc::UnboundedSender<EngineCommand>,

    queue: PendingQueue,
    transcript: Transcript,
    controller: ControllerState,
    active: Option<ActiveClip>,

    /// Monotonic tag for in-flight decode/playback operations. Messages
    /// carrying an older tag are stale and ignored.
    seq: u64,

    /// Authoritative session status (mirrored into SharedState)
    status: SessionStatus,
}

impl SessionEngine {
    /// Spawn the session actor and return its handle.
    pub fn spawn(
        state: Arc<SharedState>,
        backend: Arc<dyn AudioBackend>,
        outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
        max_queue_len: usize,
    ) -> EngineHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let engine = Self {
            state,
            backend,
            outbound_tx,
            inbox_tx: tx.clone(),
            queue: PendingQueue::new(max_queue_len),
            transcript: Transcript::new(),
            controller: ControllerState::Idle,
            active: None,
            seq: 0,
            status: SessionStatus::Idle,
        };

        tokio::spawn(engine.run(rx));

        EngineHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineCommand>) {
        info!("Session engine started");

        while let Some(cmd) = rx.recv().await {
            match cmd {
                EngineCommand::Start { document, reply } => {
                    let result = self.handle_start(document).await;
                    let _ = reply.send(result);
                }
                EngineCommand::Skip => self.handle_skip().await,
                EngineCommand::Stop => self.handle_stop().await,
                EngineCommand::Feed(event) => self.handle_feed(event).await,
                EngineCommand::DecodeComplete { seq, result } => {
                    self.handle_decode_complete(seq, result).await;
                }
                EngineCommand::PlaybackFinished { seq, result } => {
                    self.handle_playback_finished(seq, result).await;
                }
            }
        }

        info!("Session engine stopped");
    }

    // ========================================
    // Control surface
    // ========================================

    async fn handle_start(&mut self, document: String) -> Result<()> {
        info!(bytes = document.len(), "Starting new session");

        // A restart mid-session releases whatever was in flight.
        self.release_active();
        self.controller = ControllerState::Idle;
        self.queue.clear();
        self.transcript.reset();
        self.state.reset_session().await;

        self.set_status(SessionStatus::Uploading).await;

        if self
            .outbound_tx
            .send(OutboundMessage::Document { content: document })
            .is_err()
        {
            self.state
                .set_last_error(Some("Outbound channel closed".to_string()))
                .await;
            self.set_status(SessionStatus::Idle).await;
            return Err(Error::Session(
                "Outbound channel closed; cannot submit document".to_string(),
            ));
        }

        // Payload handed off; the feed starts returning segments.
        self.set_status(SessionStatus::Processing).await;
        Ok(())
    }

    /// Skip is idempotent: it only acts while a clip is audible.
    async fn handle_skip(&mut self) {
        if self.controller != ControllerState::Playing {
            debug!("Skip ignored; nothing is playing");
            return;
        }

        info!(index = self.transcript.current_index(), "Skipping current segment");

        // Releasing the clip first detaches its completion signal: the
        // finish below moves the controller off `Playing`, so a late
        // natural-completion message for this clip is dropped as stale.
        self.release_active();
        self.finish_current(SegmentOutcome::Skipped).await;
    }

    async fn handle_stop(&mut self) {
        info!("Stopping session");

        self.release_active();
        self.controller = ControllerState::Idle;
        let index = self.transcript.current_index();
        if self.transcript.reset_current_playing() {
            self.state
                .set_transcript_entry_state(index, SegmentState::Pending)
                .await;
        }

        self.queue.clear();
        self.state.set_queue_len(0);
        self.state.broadcast_event(EngineEvent::QueueChanged {
            length: 0,
            timestamp: chrono::Utc::now(),
        });

        self.set_status(SessionStatus::Idle).await;
    }

    // ========================================
    // Arrival feed
    // ========================================

    async fn handle_feed(&mut self, event: ArrivalEvent) {
        match event {
            ArrivalEvent::Text(text) => {
                // Segments are accepted while the feed is live and while a
                // closed feed's backlog is still draining; a parked session
                // ignores its feed.
                if !self.session_live() {
                    debug!("Dropping text segment; session not live");
                    return;
                }

                let index = self.transcript.append(text.clone());
                self.state.push_transcript_entry(text.clone()).await;
                debug!(index, "Transcript segment received");

                self.state.broadcast_event(EngineEvent::SegmentTextReceived {
                    index,
                    text,
                    timestamp: chrono::Utc::now(),
                });

                self.check_completion().await;
            }

            ArrivalEvent::Audio(payload) => {
                if !self.session_live() {
                    debug!("Dropping audio segment; session not live");
                    return;
                }

                if let Err(e) = self.queue.enqueue(payload) {
                    // A backlog this deep means the feed is not being
                    // consumed; treat it like a transport failure rather
                    // than stalling or silently losing a segment.
                    error!("Audio segment rejected: {}", e);
                    self.transport_error(e.to_string()).await;
                    return;
                }

                let len = self.queue.len();
                self.state.set_queue_len(len);
                debug!(backlog = len, "Audio segment enqueued");
                self.state.broadcast_event(EngineEvent::QueueChanged {
                    length: len,
                    timestamp: chrono::Utc::now(),
                });

                self.try_advance().await;
            }

            ArrivalEvent::TransportError(message) => {
                if self.status == SessionStatus::Idle {
                    debug!("Dropping transport error; session already idle");
                    return;
                }
                self.transport_error(message).await;
            }

            ArrivalEvent::Closed => {
                match self.status {
                    // Feed delivered everything; queued segments keep
                    // draining after the close.
                    SessionStatus::Processing => self.set_status(SessionStatus::Completed).await,
                    SessionStatus::Completed => {}
                    _ => self.set_status(SessionStatus::Idle).await,
                }
            }
        }
    }

    /// Whether the session is consuming segments: the feed is delivering
    /// (`Processing`) or has closed with a backlog still draining
    /// (`Completed`).
    fn session_live(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Processing | SessionStatus::Completed
        )
    }

    /// Feed or server failure: park the session. The in-flight clip, if
    /// any, is left to finish; no further advancement happens until a new
    /// session starts.
    async fn transport_error(&mut self, message: String) {
        warn!("Transport error: {}", message);
        self.state.set_last_error(Some(message)).await;
        self.set_status(SessionStatus::Idle).await;
    }

    // ========================================
    // Playback controller
    // ========================================

    /// Pull exactly one payload off the queue head and start decoding it,
    /// if the controller is free and the session is live.
    async fn try_advance(&mut self) {
        if self.controller != ControllerState::Idle {
            return;
        }
        if !self.session_live() {
            return;
        }
        // Head stays on the queue until it finishes; it is only peeked here.
        let Some(payload) = self.queue.peek_head() else {
            return;
        };
        let payload = payload.to_vec();

        self.seq += 1;
        let seq = self.seq;
        self.controller = ControllerState::Decoding;
        debug!(seq, bytes = payload.len(), "Decoding next audio segment");

        let backend = Arc::clone(&self.backend);
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            let result = backend.decode(payload).await;
            let _ = inbox.send(EngineCommand::DecodeComplete { seq, result });
        });
    }

    async fn handle_decode_complete(&mut self, seq: u64, result: Result<AudioClip>) {
        if seq != self.seq || self.controller != ControllerState::Decoding {
            debug!(seq, "Dropping stale decode result");
            return;
        }

        let clip = match result {
            Ok(clip) => clip,
            Err(e) => {
                // Non-fatal and self-healing: count the segment as failed
                // and keep the pipeline moving.
                warn!(seq, "Decode failed: {}", e);
                self.finish_current(SegmentOutcome::Failed).await;
                return;
            }
        };

        // A stale handle here means a previous release did not take; force
        // it out before starting the next clip.
        if self.active.is_some() {
            warn!("Releasing stale playback handle before starting next clip");
            self.release_active();
        }

        match self.backend.play(clip).await {
            Ok(handle) => {
                let (stop, completion) = handle.into_parts();
                self.active = Some(ActiveClip { seq, stop });
                self.controller = ControllerState::Playing;

                let index = self.transcript.current_index();
                self.transcript.mark_current_playing();
                self.state
                    .set_transcript_entry_state(index, SegmentState::Playing)
                    .await;
                debug!(seq, index, "Segment playback started");
                self.state.broadcast_event(EngineEvent::SegmentStarted {
                    index,
                    timestamp: chrono::Utc::now(),
                });

                let inbox = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let result = match completion.await {
                        Ok(result) => result,
                        // Playback side dropped without signaling; only
                        // reachable through a stop, where this message is
                        // stale anyway.
                        Err(_) => Err(Error::Playback("Playback ended without signal".to_string())),
                    };
                    let _ = inbox.send(EngineCommand::PlaybackFinished { seq, result });
                });
            }
            Err(e) => {
                warn!(seq, "Playback failed to start: {}", e);
                self.finish_current(SegmentOutcome::Failed).await;
            }
        }
    }

    async fn handle_playback_finished(&mut self, seq: u64, result: Result<()>) {
        if seq != self.seq || self.controller != ControllerState::Playing {
            debug!(seq, "Dropping stale playback completion");
            return;
        }

        match result {
            Ok(()) => self.finish_current(SegmentOutcome::Played).await,
            Err(e) => {
                warn!(seq, "Playback failed: {}", e);
                self.finish_current(SegmentOutcome::Failed).await;
            }
        }
    }

    /// The one shared stop-and-advance procedure. Whatever the reason a
    /// segment stopped being current, the queue head is removed exactly
    /// once and the pointer advances exactly once.
    async fn finish_current(&mut self, outcome: SegmentOutcome) {
        self.release_active();

        self.queue.dequeue_head();
        let len = self.queue.len();
        self.state.set_queue_len(len);
        self.state.broadcast_event(EngineEvent::QueueChanged {
            length: len,
            timestamp: chrono::Utc::now(),
        });

        let index = self.transcript.current_index();
        self.transcript.mark_current_finished(outcome);
        self.state
            .set_transcript_entry_state(index, outcome.into())
            .await;
        self.state.set_current_index(self.transcript.current_index());

        debug!(index, %outcome, "Segment finished");
        self.state.broadcast_event(EngineEvent::SegmentFinished {
            index,
            outcome,
            timestamp: chrono::Utc::now(),
        });

        self.controller = ControllerState::Idle;

        self.check_completion().await;
        self.try_advance().await;
    }

    /// Best-effort release of the active clip. Never propagates a failure;
    /// a faulty platform clip must not wedge the engine.
    fn release_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!(seq = active.seq, "Releasing active clip");
            active.stop.stop();
        }
    }

    // ========================================
    // Session status & completion
    // ========================================

    async fn check_completion(&mut self) {
        if self
            .transcript
            .is_session_complete(self.queue.is_empty(), self.status)
        {
            info!(
                segments = self.transcript.len(),
                "All segments finished; session complete"
            );
            self.set_status(SessionStatus::Completed).await;
        }
    }

    async fn set_status(&mut self, new_status: SessionStatus) {
        if self.status == new_status {
            return;
        }

        let old_status = self.status;
        self.status = new_status;
        self.state.set_session_status(new_status).await;

        info!("Session status changed: {} -> {}", old_status, new_status);
        self.state.broadcast_event(EngineEvent::SessionStatusChanged {
            old_status,
            new_status,
            timestamp: chrono::Utc::now(),
        });
    }
}
