//! Logwell daemon - syslog ingestion fleet
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config path
//! logwelld
//! logwelld --config configs/logwell.toml
//!
//! # Override the configured log level
//! logwelld --log-level debug
//! ```
//!
//! Sends SIGHUP to reload the config file and reconcile the listener
//! fleet against it; ctrl-c shuts everything down.

mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossfire::AsyncRx;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use logwell_config::{Config, LogFormat};
use logwell_fleet::ListenerFleet;
use logwell_pipeline::{ChannelSink, LogDiagnostics, SourceEvent};

use crate::store::FileConfigStore;

/// Logwell daemon - syslog ingestion fleet
#[derive(Parser, Debug)]
#[command(name = "logwelld")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/logwell.toml")]
    config: std::path::PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_path(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.log.level.as_str());
    init_logging(level, config.log.format)?;

    run(cli, config).await
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let (event_tx, event_rx) = crossfire::mpsc::bounded_async(config.queue_size);
    let sink = Arc::new(ChannelSink::new(event_tx));
    let fleet = ListenerFleet::new(config.tuning.clone(), sink, Arc::new(LogDiagnostics));

    let store = FileConfigStore::new(&cli.config);
    let started = fleet.start_all(&store).await?;
    tracing::info!(
        listeners = started,
        config = %cli.config.display(),
        "logwell daemon running"
    );

    // The ingestion store behind this loop is a separate system; events
    // leave the syslog core here.
    let drain = tokio::spawn(drain_events(event_rx));

    wait_for_shutdown(&fleet, &store).await;

    fleet.shutdown().await;
    drain.abort();
    tracing::info!("logwell daemon stopped");
    Ok(())
}

/// Consume parsed events off the pipeline channel
async fn drain_events(rx: AsyncRx<SourceEvent>) {
    while let Ok(item) = rx.recv().await {
        tracing::debug!(
            slug = %item.slug,
            level = %item.event.level,
            message = %item.event.message,
            "event ingested"
        );
    }
}

/// Block until ctrl-c; reload config and reconcile on SIGHUP
async fn wait_for_shutdown(fleet: &Arc<ListenerFleet>, store: &FileConfigStore) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP handler unavailable, reload disabled");
                wait_for_ctrl_c().await;
                return;
            }
        };

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, reloading configuration");
                    match fleet.reconcile(store).await {
                        Ok(()) => tracing::info!(
                            listeners = fleet.running_count().await,
                            "configuration reloaded"
                        ),
                        Err(e) => tracing::error!(error = %e, "configuration reload failed"),
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (fleet, store);
        wait_for_ctrl_c().await;
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match format {
        LogFormat::Console => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_thread_ids(false))
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .init();
        }
    }

    Ok(())
}
