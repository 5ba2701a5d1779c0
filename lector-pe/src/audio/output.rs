//! Audio output using cpal
//!
//! Production [`AudioBackend`]: decodes on the blocking pool and plays each
//! clip through a dedicated output stream. A clip is short (one spoken
//! sentence), so its samples are resampled to the device rate and staged
//! into a lock-free ring buffer up front; the stream callback drains the
//! buffer and flags completion when it runs dry.
//!
//! The stream lives on its own OS thread because cpal streams are not
//! `Send`. The thread tears the stream down on natural completion, on an
//! explicit stop signal, or when the stop side is dropped.

use crate::audio::{decode, resampler, AudioBackend, AudioClip, PlaybackHandle};
use crate::{Error, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Drain allowance for the device's final buffer before stream teardown.
const TEARDOWN_DRAIN: Duration = Duration::from_millis(50);

/// Poll interval for the stop signal while a clip plays.
const STOP_POLL: Duration = Duration::from_millis(10);

/// cpal-based decode/playback backend.
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    /// Create the backend, verifying that an output device is reachable.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    pub fn new(device_name: Option<String>) -> Result<Self> {
        let device = resolve_device(device_name.as_deref())?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device config: {}", e)))?;

        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate = config.sample_rate().0,
            channels = config.channels(),
            "Audio output device ready"
        );

        Ok(Self { device_name })
    }

    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }
}

#[async_trait]
impl AudioBackend for CpalBackend {
    async fn decode(&self, payload: Vec<u8>) -> Result<AudioClip> {
        tokio::task::spawn_blocking(move || decode::decode_clip(&payload))
            .await
            .map_err(|e| Error::Decode(format!("Decode task panicked: {}", e)))?
    }

    async fn play(&self, clip: AudioClip) -> Result<PlaybackHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let (completion_tx, completion_rx) = oneshot::channel::<Result<()>>();

        let device_name = self.device_name.clone();
        std::thread::Builder::new()
            .name("lector-playback".to_string())
            .spawn(move || {
                run_playback(device_name, clip, stop_rx, ready_tx, completion_tx);
            })
            .map_err(|e| Error::Playback(format!("Failed to spawn playback thread: {}", e)))?;

        // Wait until the stream is live (or failed to open) so the caller
        // sees start failures synchronously.
        match ready_rx.await {
            Ok(Ok(())) => Ok(PlaybackHandle::new(
                move || {
                    let _ = stop_tx.send(());
                },
                completion_rx,
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Playback(
                "Playback thread exited before starting".to_string(),
            )),
        }
    }
}

/// Resolve the output device, falling back to the default device when the
/// requested one is missing.
fn resolve_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }

        warn!(
            "Requested device '{}' not found, falling back to default device",
            name
        );
    }

    host.default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
}

/// Body of the per-clip playback thread.
fn run_playback(
    device_name: Option<String>,
    clip: AudioClip,
    stop_rx: mpsc::Receiver<()>,
    ready_tx: oneshot::Sender<Result<()>>,
    completion_tx: oneshot::Sender<Result<()>>,
) {
    let finished = Arc::new(AtomicBool::new(false));
    let errored = Arc::new(AtomicBool::new(false));

    let stream = match open_stream(device_name, &clip, &finished, &errored) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::Playback(format!(
            "Failed to start stream: {}",
            e
        ))));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    let outcome: Option<Result<()>> = loop {
        if errored.load(Ordering::Relaxed) {
            break Some(Err(Error::Playback(
                "Audio stream reported an error".to_string(),
            )));
        }
        if finished.load(Ordering::Relaxed) {
            // Let the device drain its last buffer before teardown.
            std::thread::sleep(TEARDOWN_DRAIN);
            break Some(Ok(()));
        }

        match stop_rx.recv_timeout(STOP_POLL) {
            // Explicit stop: the engine suppresses the completion signal,
            // so none is sent here.
            Ok(()) => break None,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            // Stop side dropped without firing; halt playback.
            Err(mpsc::RecvTimeoutError::Disconnected) => break None,
        }
    };

    drop(stream);
    if let Some(result) = outcome {
        let _ = completion_tx.send(result);
    }
}

/// Open the device, stage the clip into a ring buffer, and build the stream.
fn open_stream(
    device_name: Option<String>,
    clip: &AudioClip,
    finished: &Arc<AtomicBool>,
    errored: &Arc<AtomicBool>,
) -> Result<Stream> {
    let device = resolve_device(device_name.as_deref())?;
    let supported = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get device config: {}", e)))?;

    let out_rate = supported.sample_rate().0;
    let out_channels = supported.channels();
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let resampled = resampler::resample(&clip.samples, clip.sample_rate, out_rate, clip.channels)?;
    let samples = adapt_channels(&resampled, out_channels);

    // The whole clip is staged up front; the callback only ever drains.
    let rb = HeapRb::<f32>::new(samples.len().max(1));
    let (mut producer, consumer) = rb.split();
    let pushed = producer.push_slice(&samples);
    debug!(
        frames = pushed / out_channels.max(1) as usize,
        rate = out_rate,
        "Staged clip for playback"
    );

    match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, finished, errored),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, finished, errored),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, finished, errored),
        other => Err(Error::AudioOutput(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    finished: &Arc<AtomicBool>,
    errored: &Arc<AtomicBool>,
) -> Result<Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let finished = Arc::clone(finished);
    let errored = Arc::clone(errored);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                for slot in data.iter_mut() {
                    let sample = consumer.try_pop().unwrap_or_else(|| {
                        finished.store(true, Ordering::Relaxed);
                        0.0
                    });
                    *slot = T::from_sample(sample);
                }
            },
            move |e| {
                errored.store(true, Ordering::Relaxed);
                error!("Audio stream error: {}", e);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build output stream: {}", e)))
}

/// Adapt interleaved stereo samples to the device channel count.
fn adapt_channels(stereo: &[f32], out_channels: u16) -> Vec<f32> {
    match out_channels {
        2 => stereo.to_vec(),
        // Mono device: average the pair
        0 | 1 => stereo
            .chunks_exact(2)
            .map(|frame| (frame[0] + frame[1]) * 0.5)
            .collect(),
        // Surround device: front pair carries the clip, the rest silence
        n => {
            let n = n as usize;
            let mut out = Vec::with_capacity(stereo.len() / 2 * n);
            for frame in stereo.chunks_exact(2) {
                out.push(frame[0]);
                out.push(frame[1]);
                out.extend(std::iter::repeat(0.0).take(n - 2));
            }
            out
        }
    }
}
