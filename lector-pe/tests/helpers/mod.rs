//! Shared test helpers
//!
//! Provides a scripted audio backend so the sequencing state machine can be
//! driven without a real audio device: decode results are derived from the
//! payload bytes, and playback completions fire only when the test says so.

#![allow(dead_code)]

use async_trait::async_trait;
use lector_common::events::SessionStatus;
use lector_pe::audio::{AudioBackend, AudioClip, PlaybackHandle};
use lector_pe::outbound::OutboundMessage;
use lector_pe::playback::engine::{EngineHandle, SessionEngine};
use lector_pe::state::SharedState;
use lector_pe::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Payload that fails to decode.
pub const BAD_PAYLOAD: &[u8] = b"<decode-fail>";

#[derive(Default)]
struct Inner {
    /// Payloads handed to the decode primitive, in hand-off order
    decoded: Vec<Vec<u8>>,
    /// One completion sender per started play, in start order
    play_senders: Vec<Option<oneshot::Sender<Result<()>>>>,
    plays_started: usize,
    active_plays: usize,
    max_active_plays: usize,
    releases: usize,
    fail_next_play: bool,
}

/// Audio backend with test-controlled playback completion.
pub struct ScriptedBackend {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        })
    }

    /// Payloads handed to decode so far, in order.
    pub fn decoded_payloads(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().decoded.clone()
    }

    pub fn plays_started(&self) -> usize {
        self.inner.lock().unwrap().plays_started
    }

    pub fn active_plays(&self) -> usize {
        self.inner.lock().unwrap().active_plays
    }

    /// High-water mark of concurrently live playbacks.
    pub fn max_active_plays(&self) -> usize {
        self.inner.lock().unwrap().max_active_plays
    }

    /// Number of handle releases (explicit stop or post-completion cleanup).
    pub fn release_count(&self) -> usize {
        self.inner.lock().unwrap().releases
    }

    /// Make the next `play` call fail to start.
    pub fn fail_next_play(&self) {
        self.inner.lock().unwrap().fail_next_play = true;
    }

    /// Fire the completion signal of the n-th started play (0-based).
    ///
    /// Returns false if that completion was already fired or its receiver
    /// is gone.
    pub fn complete_play(&self, n: usize, result: Result<()>) -> bool {
        let sender = {
            let mut inner = self.inner.lock().unwrap();
            inner.play_senders.get_mut(n).and_then(|s| s.take())
        };
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl AudioBackend for ScriptedBackend {
    async fn decode(&self, payload: Vec<u8>) -> Result<AudioClip> {
        let mut inner = self.inner.lock().unwrap();
        inner.decoded.push(payload.clone());

        if payload == BAD_PAYLOAD {
            return Err(Error::Decode("scripted decode failure".to_string()));
        }

        Ok(AudioClip {
            samples: vec![0.0; 64],
            sample_rate: 22050,
            channels: 2,
        })
    }

    async fn play(&self, _clip: AudioClip) -> Result<PlaybackHandle> {
        let (completion_tx, completion_rx) = oneshot::channel();

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_next_play {
                inner.fail_next_play = false;
                return Err(Error::Playback("scripted playback failure".to_string()));
            }

            inner.play_senders.push(Some(completion_tx));
            inner.plays_started += 1;
            inner.active_plays += 1;
            inner.max_active_plays = inner.max_active_plays.max(inner.active_plays);
        }

        let counters = Arc::clone(&self.inner);
        Ok(PlaybackHandle::new(
            move || {
                let mut inner = counters.lock().unwrap();
                inner.releases += 1;
                inner.active_plays = inner.active_plays.saturating_sub(1);
            },
            completion_rx,
        ))
    }
}

/// Everything a sequencing test needs.
pub struct TestHarness {
    pub engine: EngineHandle,
    pub state: Arc<SharedState>,
    pub backend: Arc<ScriptedBackend>,
    pub outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

/// Build an engine over a scripted backend.
pub fn harness() -> TestHarness {
    harness_with_queue(64)
}

pub fn harness_with_queue(max_queue_len: usize) -> TestHarness {
    let state = Arc::new(SharedState::new());
    let backend = ScriptedBackend::new();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let engine = SessionEngine::spawn(
        Arc::clone(&state),
        backend.clone(),
        outbound_tx,
        max_queue_len,
    );

    TestHarness {
        engine,
        state,
        backend,
        outbound_rx,
    }
}

/// Start a session and swallow the outbound document.
pub async fn start_session(harness: &mut TestHarness) {
    harness
        .engine
        .start("source document".to_string())
        .await
        .unwrap();

    let msg = harness.outbound_rx.recv().await.expect("outbound document");
    let OutboundMessage::Document { content } = msg;
    assert_eq!(content, "source document");
}

/// Poll a condition until it holds or two seconds pass.
pub async fn wait_until(description: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {}", description);
}

/// Poll the shared session status until it matches.
pub async fn wait_for_status(state: &SharedState, expected: SessionStatus) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if state.get_session_status().await == expected {
            return;
        }
        if Instant::now() >= deadline {
            panic!(
                "timed out waiting for status {:?}, currently {:?}",
                expected,
                state.get_session_status().await
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
