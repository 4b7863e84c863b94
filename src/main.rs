//! Chat Venue - Entry Point
//!
//! Loads configuration, starts the venue and waits for every actor.
//! Ctrl-C interrupts all actors at their next pause.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_venue::{simulation, Config, EventFormat, JsonSink, SharedSink, TracingSink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_venue=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_venue=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Starting chat venue with {:?}", config);

    let sink: SharedSink = match config.event_format {
        EventFormat::Text => Arc::new(TracingSink),
        EventFormat::Json => Arc::new(JsonSink),
    };

    // Cancel every actor on Ctrl-C
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping actors");
                interrupt.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let mut rng = StdRng::from_entropy();
    let report = simulation::run(&config, sink, cancel, &mut rng).await?;

    info!(
        "Venue finished: admin {:?}, {} users completed, {} interrupted",
        report.admin,
        report.completed_users(),
        report.interrupted_users()
    );

    Ok(())
}
