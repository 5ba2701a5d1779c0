//! Sequential playback core
//!
//! - [`queue`]: FIFO of audio payloads awaiting playback
//! - [`transcript`]: arrival-ordered segments and the playback pointer
//! - [`engine`]: the session actor owning both plus the playback controller

pub mod engine;
pub mod queue;
pub mod transcript;

pub use engine::{EngineHandle, SessionEngine};
pub use queue::PendingQueue;
pub use transcript::Transcript;
