//! Audio decoder using symphonia
//!
//! Decodes a complete in-memory payload (one feed segment) into an
//! [`AudioClip`].
//!
//! # Supported Formats
//!
//! Per Cargo.toml symphonia features: WAV/PCM, MP3, FLAC, Vorbis/OGG.
//!
//! # Sample Format
//!
//! Output is interleaved stereo f32. Mono sources are duplicated to stereo;
//! sources with more than two channels keep their first two.

use crate::audio::AudioClip;
use crate::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode one encoded audio payload into a playable clip.
///
/// Fails if the container/codec cannot be identified, the payload holds no
/// audio track, or no frames decode. Individual malformed packets inside an
/// otherwise valid stream are skipped (symphonia convention).
pub fn decode_clip(payload: &[u8]) -> Result<AudioClip> {
    if payload.is_empty() {
        return Err(Error::Decode("Empty audio payload".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(payload.to_vec())), Default::default());

    // No filename available for segments off the feed; probe by content.
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("Unrecognized audio format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Audio track reports no sample rate".to_string()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::Decode(format!("Packet read failed: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    let capacity = decoded.capacity() as u64;
                    sample_buf = Some(SampleBuffer::new(capacity, spec));
                }

                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            // Recoverable: skip the malformed packet and continue
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping malformed packet: {}", e);
            }
            Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode("No audio frames decoded".to_string()));
    }

    let stereo = to_stereo(&samples, channels);

    debug!(
        frames = stereo.len() / 2,
        sample_rate, channels, "Decoded audio segment"
    );

    Ok(AudioClip {
        samples: stereo,
        sample_rate,
        channels: 2,
    })
}

/// Normalize interleaved samples of any channel count to interleaved stereo.
fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        // Mono: duplicate to both channels
        0 | 1 => {
            let mut out = Vec::with_capacity(samples.len() * 2);
            for &s in samples {
                out.push(s);
                out.push(s);
            }
            out
        }
        2 => samples.to_vec(),
        // Multi-channel: keep the front pair
        n => {
            let frames = samples.len() / n;
            let mut out = Vec::with_capacity(frames * 2);
            for frame in 0..frames {
                out.push(samples[frame * n]);
                out.push(samples[frame * n + 1]);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an in-memory WAV payload with the given frames.
    fn wav_payload(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                for _ in 0..channels {
                    writer.write_sample(sample).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav_stereo() {
        let payload = wav_payload(22050, 2, 2205);
        let clip = decode_clip(&payload).unwrap();

        assert_eq!(clip.sample_rate, 22050);
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.frames(), 2205);
        assert_eq!(clip.duration_ms(), 100);
    }

    #[test]
    fn test_decode_wav_mono_duplicates_to_stereo() {
        let payload = wav_payload(16000, 1, 1600);
        let clip = decode_clip(&payload).unwrap();

        assert_eq!(clip.channels, 2);
        assert_eq!(clip.frames(), 1600);
        // Left and right are identical after duplication
        assert_eq!(clip.samples[0], clip.samples[1]);
        assert_eq!(clip.samples[2], clip.samples[3]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_clip(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03]);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        let result = decode_clip(&[]);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_to_stereo_downmixes_front_pair() {
        // Two 4-channel frames
        let samples = vec![0.1, 0.2, 0.9, 0.9, 0.3, 0.4, 0.9, 0.9];
        let stereo = to_stereo(&samples, 4);
        assert_eq!(stereo, vec![0.1, 0.2, 0.3, 0.4]);
    }
}
