//! Playback Engine (lector-pe) - Main entry point
//!
//! This is the sequential playback microservice for Lector: it consumes an
//! ordered feed of text/audio segments, plays the audio strictly in arrival
//! order, keeps the transcript in lockstep, and exposes an HTTP/SSE control
//! interface for the surrounding UI.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lector_pe::api;
use lector_pe::audio::output::CpalBackend;
use lector_pe::outbound;
use lector_pe::playback::engine::SessionEngine;
use lector_pe::SharedState;

/// Command-line arguments for lector-pe
#[derive(Parser, Debug)]
#[command(name = "lector-pe")]
#[command(about = "Sequential playback engine for Lector")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "LECTOR_PE_PORT")]
    port: u16,

    /// Synthesis service endpoint for document submission
    #[arg(short, long, env = "LECTOR_SYNTHESIS_URL")]
    synthesis_url: Option<String>,

    /// Audio output device name (default device when omitted)
    #[arg(short = 'd', long, env = "LECTOR_AUDIO_DEVICE")]
    audio_device: Option<String>,

    /// Maximum pending queue backlog before the session aborts
    #[arg(long, default_value = "64", env = "LECTOR_MAX_QUEUE")]
    max_queue_len: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lector_pe=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();
    let synthesis_url =
        lector_common::config::resolve_synthesis_url(args.synthesis_url.as_deref());

    info!("Starting Lector Playback Engine on port {}", args.port);
    info!("Synthesis endpoint: {}", synthesis_url);

    // Audio backend (decode + output)
    let backend = Arc::new(
        CpalBackend::new(args.audio_device.clone())
            .context("Failed to initialize audio output")?,
    );

    // Shared state + session engine
    let state = Arc::new(SharedState::new());
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let engine = SessionEngine::spawn(
        Arc::clone(&state),
        backend,
        outbound_tx,
        args.max_queue_len,
    );
    info!("Session engine initialized");

    // Outbound document submitter
    outbound::spawn_submitter(synthesis_url, outbound_rx, engine.clone());

    // Build the application router
    let app_state = api::AppState {
        engine,
        state,
        port: args.port,
    };
    let app = api::create_router(app_state);

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
