//! Battle server entry point.
//!
//! Loads configuration from the environment, opens the durable stores under
//! the data directory, recovers live battles and runs until ctrl-c, then
//! writes every live session one last time before exiting.
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use runtime::{
    ChannelTransport, EventContext, FileBattleStore, FileEventLog, Runtime, RuntimeConfig, Topic,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = RuntimeConfig::from_env();
    logging::setup_logging(&config.data_dir.join("logs"))?;

    let store = FileBattleStore::open(config.data_dir.join("sessions"))
        .await
        .with_context(|| format!("opening battle store in {}", config.data_dir.display()))?;
    let event_log = FileEventLog::open_or_create(&config.data_dir, "events.jsonl")
        .context("opening event log")?;

    info!(
        data_dir = %config.data_dir.display(),
        turn_seconds = config.turn_duration.as_secs(),
        "Starting battle server"
    );

    // Empty until the client routing layer registers a channel for each
    // connected participant; messages for unregistered participants are dropped.
    let transport = Arc::new(ChannelTransport::new());
    let runtime = Runtime::builder()
        .config(config)
        .store(Arc::new(store))
        .event_log(Arc::new(event_log))
        .transport(transport)
        .build()
        .await
        .context("starting runtime")?;

    let handle = runtime.handle();
    info!(
        recovered = runtime.recovered_sessions(),
        live = handle.sessions().len(),
        "Battle server ready"
    );

    if let Some(mut matches) = handle.subscribe(Topic::Match) {
        tokio::spawn(async move {
            loop {
                match matches.recv().await {
                    Ok(event) if event.context == EventContext::Match => {
                        info!(session = ?event.session, "{}", event.message);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Match log lagged, {} events skipped", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Match log stopped");
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    let report = runtime.shutdown().await.context("shutting down runtime")?;
    info!(
        written = report.written,
        failed = report.failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Final persistence pass complete"
    );
    Ok(())
}
