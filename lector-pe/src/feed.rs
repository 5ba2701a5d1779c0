//! Arrival feed event types and wire parsing
//!
//! The feed delivers a strictly ordered sequence of JSON events:
//! `{"type":"text","content":...}` for transcript units,
//! `{"type":"audio","content":<base64>}` for audio units, and
//! `{"type":"error","content":...}` for server-reported failures. Transport
//! framing and connection lifecycle live outside the engine; the ingest
//! adapter in `api` forwards parsed events to the session actor in arrival
//! order and signals `Closed` when the channel ends.

use crate::{Error, Result};
use base64::Engine as _;
use serde::Deserialize;

/// One feed message as it appears on the wire.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// New transcript unit
    Text { content: String },
    /// New audio unit, base64-encoded
    Audio { content: String },
    /// Transport/server-reported failure; aborts the session
    Error { content: String },
}

/// A feed event after wire decoding, as consumed by the session actor.
#[derive(Debug, Clone)]
pub enum ArrivalEvent {
    /// New transcript unit
    Text(String),
    /// New audio unit, raw encoded bytes
    Audio(Vec<u8>),
    /// Transport or server failure; no further feed processing
    TransportError(String),
    /// The feed has no more input
    Closed,
}

impl TryFrom<FeedMessage> for ArrivalEvent {
    type Error = Error;

    fn try_from(msg: FeedMessage) -> Result<Self> {
        match msg {
            FeedMessage::Text { content } => Ok(ArrivalEvent::Text(content)),
            FeedMessage::Audio { content } => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(content.as_bytes())
                    .map_err(|e| Error::Feed(format!("Invalid base64 audio payload: {}", e)))?;
                Ok(ArrivalEvent::Audio(bytes))
            }
            FeedMessage::Error { content } => Ok(ArrivalEvent::TransportError(content)),
        }
    }
}

/// Parse one raw feed message into an arrival event.
///
/// Malformed payloads are reported as `Error::Feed`; the caller treats them
/// like a transport error (session aborts, no further feed processing).
pub fn parse_feed_event(raw: &str) -> Result<ArrivalEvent> {
    let msg: FeedMessage =
        serde_json::from_str(raw).map_err(|e| Error::Feed(format!("Malformed feed event: {}", e)))?;
    msg.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_event() {
        let event = parse_feed_event(r#"{"type":"text","content":"Hello there."}"#).unwrap();
        match event {
            ArrivalEvent::Text(text) => assert_eq!(text, "Hello there."),
            other => panic!("Expected Text, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_audio_event_decodes_base64() {
        // "audio" -> YXVkaW8=
        let event = parse_feed_event(r#"{"type":"audio","content":"YXVkaW8="}"#).unwrap();
        match event {
            ArrivalEvent::Audio(bytes) => assert_eq!(bytes, b"audio"),
            other => panic!("Expected Audio, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_event() {
        let event = parse_feed_event(r#"{"type":"error","content":"tts backend died"}"#).unwrap();
        match event {
            ArrivalEvent::TransportError(msg) => assert_eq!(msg, "tts backend died"),
            other => panic!("Expected TransportError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        let result = parse_feed_event(r#"{"type":"audio","content":"!!not-base64!!"}"#);
        assert!(matches!(result, Err(Error::Feed(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let result = parse_feed_event(r#"{"type":"video","content":"x"}"#);
        assert!(matches!(result, Err(Error::Feed(_))));
    }

    #[test]
    fn test_parse_rejects_missing_content() {
        let result = parse_feed_event(r#"{"type":"text"}"#);
        assert!(matches!(result, Err(Error::Feed(_))));
    }
}
