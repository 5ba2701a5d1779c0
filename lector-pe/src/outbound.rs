//! Outbound document submission
//!
//! The engine produces exactly one outbound message per session start: the
//! source document content. A background submitter task delivers it to the
//! synthesis service over HTTP; delivery failures re-enter the engine as
//! transport errors on the feed, the same path a server-reported `error`
//! event takes.

use crate::feed::ArrivalEvent;
use crate::playback::engine::EngineHandle;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Messages on the engine's outbound channel.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Source document for this session, sent once per session start
    Document { content: String },
}

/// Spawn the submitter task.
///
/// Consumes outbound messages and POSTs them to `synthesis_url`. The task
/// ends when the outbound channel closes (engine dropped).
pub fn spawn_submitter(
    synthesis_url: String,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    engine: EngineHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::new();

        while let Some(msg) = rx.recv().await {
            let OutboundMessage::Document { content } = msg;

            info!(
                url = %synthesis_url,
                bytes = content.len(),
                "Submitting source document to synthesis service"
            );

            let result = client
                .post(&synthesis_url)
                .json(&json!({ "content": content }))
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!("Document accepted by synthesis service");
                }
                Ok(response) => {
                    let status = response.status();
                    error!("Synthesis service rejected document: HTTP {}", status);
                    let _ = engine.feed_event(ArrivalEvent::TransportError(format!(
                        "synthesis service rejected document: HTTP {}",
                        status
                    )));
                }
                Err(e) => {
                    error!("Failed to reach synthesis service: {}", e);
                    let _ = engine.feed_event(ArrivalEvent::TransportError(format!(
                        "failed to reach synthesis service: {}",
                        e
                    )));
                }
            }
        }
    })
}
