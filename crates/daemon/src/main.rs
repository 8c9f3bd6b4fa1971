// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics Relay Daemon (mrd)
//!
//! Accepts metric instances from the control plane, persists them in batches
//! and forwards the batches upstream.

use mr_daemon::lifecycle;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up logging first: configuration errors are logged, not fatal
    let log_guard = setup_logging();

    let args: Vec<String> = std::env::args().collect();
    let config = match lifecycle::load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut relay = match lifecycle::startup(&config).await {
        Ok(relay) => relay,
        Err(e) => {
            error!("Failed to start relay: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Relay ready, listening on {}", relay.local_addr);

    // Main event loop
    let fatal = loop {
        tokio::select! {
            // Accept control-plane connections
            result = relay.listener.accept() => {
                match result {
                    Ok((stream, peer)) => relay.spawn_connection(stream, peer),
                    Err(e) => error!("Error accepting connection: {}", e),
                }
            }

            // Reap finished connection tasks
            Some(joined) = relay.connections.join_next() => {
                if let Err(e) = joined {
                    error!("Connection task failed: {}", e);
                }
            }

            // A stage died
            Some(e) = relay.fatal.recv() => {
                error!("Fatal error, shutting down: {}", e);
                break Some(e);
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break None;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break None;
            }
        }
    };

    let stopped = relay.shutdown().await;
    info!("Relay stopped");
    drop(log_guard);

    match (fatal, stopped) {
        (Some(e), _) | (None, Err(e)) => Err(e.into()),
        (None, Ok(())) => Ok(()),
    }
}

fn setup_logging() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    guard
}
