//! Audio decode and output
//!
//! The engine treats audio as an opaque capability behind [`AudioBackend`]:
//! `decode(bytes) -> clip` and `play(clip) -> handle`. The production
//! backend decodes with symphonia and plays through cpal; tests substitute
//! a scripted backend to drive the sequencing state machine directly.

pub mod decode;
pub mod output;
pub mod resampler;

use crate::Result;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

/// One fully decoded audio segment.
///
/// Samples are interleaved stereo f32 (`[L, R, L, R, ...]`).
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Interleaved stereo samples
    pub samples: Vec<f32>,
    /// Native sample rate of the decoded audio
    pub sample_rate: u32,
    /// Channel count (always 2 after decode normalization)
    pub channels: u16,
}

impl AudioClip {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Clip duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Handle to one in-flight playback.
///
/// At most one live handle exists at any time; it is exclusively owned by
/// the playback controller. Splitting separates the stop side (kept by the
/// controller) from the completion side (awaited by a watcher task).
pub struct PlaybackHandle {
    stop: StopHandle,
    completion: oneshot::Receiver<Result<()>>,
}

impl PlaybackHandle {
    /// Build a handle from a stop action and a completion receiver.
    ///
    /// `stop` is invoked at most once; it must tolerate playback having
    /// already ended.
    pub fn new(
        stop: impl FnOnce() + Send + 'static,
        completion: oneshot::Receiver<Result<()>>,
    ) -> Self {
        Self {
            stop: StopHandle {
                action: Some(Box::new(stop)),
            },
            completion,
        }
    }

    /// Split into the stop side and the completion side.
    pub fn into_parts(self) -> (StopHandle, oneshot::Receiver<Result<()>>) {
        (self.stop, self.completion)
    }
}

/// Stop side of a [`PlaybackHandle`].
///
/// Release is best-effort and idempotent: a second `stop()` is a no-op, and
/// a stop after natural completion is tolerated.
pub struct StopHandle {
    action: Option<Box<dyn FnOnce() + Send>>,
}

impl StopHandle {
    /// Stop and release the underlying playback resources.
    pub fn stop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        } else {
            debug!("Playback handle already released");
        }
    }
}

/// Decode and playback capability supplied by the platform.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Decode raw encoded audio bytes into a playable clip.
    async fn decode(&self, payload: Vec<u8>) -> Result<AudioClip>;

    /// Begin playback of a clip.
    ///
    /// Returns as soon as playback has started; the clip's end-of-media is
    /// signaled through the handle's completion receiver.
    async fn play(&self, clip: AudioClip) -> Result<PlaybackHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_clip_frames_and_duration() {
        let clip = AudioClip {
            samples: vec![0.0; 44100 * 2],
            sample_rate: 44100,
            channels: 2,
        };
        assert_eq!(clip.frames(), 44100);
        assert_eq!(clip.duration_ms(), 1000);
    }

    #[tokio::test]
    async fn test_stop_handle_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let (_tx, rx) = oneshot::channel();

        let handle = PlaybackHandle::new(
            move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            rx,
        );
        let (mut stop, _completion) = handle.into_parts();

        stop.stop();
        stop.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
