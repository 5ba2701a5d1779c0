//! # Lector Playback Engine Library (lector-pe)
//!
//! Sequential playback engine for streamed read-aloud sessions.
//!
//! **Purpose:** Consume an ordered feed of text/audio segments, play the
//! audio strictly in arrival order one segment at a time, keep the
//! transcript in lockstep with what is audible, and provide an HTTP/SSE
//! control interface.
//!
//! **Architecture:** Single session actor over tokio mpsc, decoding via
//! symphonia, output via cpal, control surface via axum.

pub mod api;
pub mod audio;
pub mod error;
pub mod feed;
pub mod outbound;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
