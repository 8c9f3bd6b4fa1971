// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay lifecycle management: configuration, startup, shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use mr_adapters::{HttpUpstream, TracedUpstream};
use mr_core::{ingest_buffer, BufferSender, PersistenceBackend, RelayConfig};
use mr_engine::{Publisher, Writer, WriterStats};
use mr_storage::select_backend;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::server;

/// Build the configuration from the environment; the first argument, if
/// present, overrides the listening port
pub fn load_config(args: &[String]) -> Result<RelayConfig, LifecycleError> {
    let mut config = RelayConfig::from_env();
    if let Some(port) = args.get(1) {
        config.port = port
            .parse()
            .map_err(|_| LifecycleError::InvalidPort(port.clone()))?;
    }
    Ok(config)
}

/// Relay state during operation
pub struct Relay {
    /// Ingestion listener
    pub listener: TcpListener,
    pub local_addr: SocketAddr,
    /// Fatal stage errors; any message here stops the relay
    pub fatal: mpsc::Receiver<LifecycleError>,
    /// One task per open connection
    pub connections: JoinSet<()>,
    buffer: BufferSender,
    backend: Arc<dyn PersistenceBackend>,
    writer: JoinHandle<Option<WriterStats>>,
    publisher: Option<JoinHandle<Option<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Relay {
    /// Serve a new connection on its own task
    pub fn spawn_connection(&mut self, stream: TcpStream, peer: SocketAddr) {
        let buffer = self.buffer.clone();
        self.connections.spawn(async move {
            if let Err(e) = server::handle_connection(stream, buffer).await {
                warn!(%peer, error = %e, "connection ended with error");
            }
        });
    }

    /// Stop the relay
    ///
    /// Open connections are dropped, the writer flushes what it holds, and
    /// the publisher stops at its next tick boundary.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down relay...");
        let Relay {
            listener,
            mut connections,
            buffer,
            backend,
            writer,
            publisher,
            shutdown_tx,
            ..
        } = self;

        // 1. Stop accepting and drop every buffer sender
        drop(listener);
        connections.abort_all();
        while connections.join_next().await.is_some() {}
        drop(buffer);

        // 2. Writer drains the buffer and flushes the partial batch
        if let Some(stats) = writer.await.map_err(LifecycleError::from_join("writer"))? {
            info!(
                batches = stats.batches_written,
                records = stats.records_written,
                dropped = stats.records_dropped,
                "writer finished"
            );
        }

        // 3. Publisher
        let _ = shutdown_tx.send(true);
        if let Some(publisher) = publisher {
            publisher.await.map_err(LifecycleError::from_join("publisher"))?;
        }

        match backend.pending_count().await {
            Ok(pending) => info!(backend = %backend.kind(), pending, "Relay shutdown complete"),
            Err(e) => warn!(error = %e, "Relay shutdown complete; pending count unavailable"),
        }
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid port argument: {0}")]
    InvalidPort(String),

    #[error("Failed to bind port {0}: {1}")]
    BindFailed(u16, std::io::Error),

    #[error("{stage} stage failed: {message}")]
    StageFailed {
        stage: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    fn from_join(stage: &'static str) -> impl Fn(tokio::task::JoinError) -> Self {
        move |e| LifecycleError::StageFailed {
            stage,
            message: e.to_string(),
        }
    }
}

/// Start the relay
pub async fn startup(config: &RelayConfig) -> Result<Relay, LifecycleError> {
    // 1. Select the persistence backend (may retry a database connect)
    let selection = select_backend(config).await;
    if let Some(e) = &selection.fallback {
        warn!(backend = %selection.kind(), error = %e, "persistence degraded");
    }
    let backend = selection.backend;

    // 2. Bind (LAST - only once the backend is ready)
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(|e| LifecycleError::BindFailed(config.port, e))?;
    let local_addr = listener.local_addr()?;

    // 3. Pipeline stages
    let (buffer, receiver) = ingest_buffer(config.queue_length);
    let (fatal_tx, fatal) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let writer = Writer::new(
        receiver,
        Arc::clone(&backend),
        config.batch_size,
        config.flush_interval,
    );
    let writer = supervise("writer", tokio::spawn(writer.run()), fatal_tx.clone());

    let publisher = match &config.upstream_url {
        Some(url) => {
            let upstream = TracedUpstream::new(HttpUpstream::new(url, config.http_timeout), url);
            let publisher = Publisher::new(
                Arc::clone(&backend),
                Arc::new(upstream),
                config.publish_interval,
            );
            Some(supervise(
                "publisher",
                tokio::spawn(publisher.run(shutdown_rx)),
                fatal_tx,
            ))
        }
        None => {
            warn!("SP_SERVER_URL not set, batches will accumulate without delivery");
            None
        }
    };

    info!(
        port = local_addr.port(),
        backend = %backend.kind(),
        batch_size = config.batch_size,
        buffer_capacity = buffer.capacity(),
        "Relay started"
    );

    Ok(Relay {
        listener,
        local_addr,
        fatal,
        connections: JoinSet::new(),
        buffer,
        backend,
        writer,
        publisher,
        shutdown_tx,
    })
}

/// Watch a stage task and report its failure on the fatal channel
fn supervise<T: Send + 'static>(
    stage: &'static str,
    task: JoinHandle<T>,
    fatal: mpsc::Sender<LifecycleError>,
) -> JoinHandle<Option<T>> {
    tokio::spawn(async move {
        match task.await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(stage, error = %e, "stage task failed");
                // Single slot: the first fatal error wins
                let _ = fatal.try_send(LifecycleError::from_join(stage)(e));
                None
            }
        }
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
