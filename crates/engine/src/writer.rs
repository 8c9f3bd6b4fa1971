// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer stage: ingestion buffer to durable batches

use crate::accumulator::Accumulator;
use mr_core::{BufferReceiver, PersistenceBackend, Record};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Counters reported when the writer stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub batches_written: u64,
    pub records_written: u64,
    pub batches_dropped: u64,
    pub records_dropped: u64,
}

/// Drains the ingestion buffer into batches on the persistence backend
pub struct Writer {
    buffer: BufferReceiver,
    backend: Arc<dyn PersistenceBackend>,
    accumulator: Accumulator,
    stats: WriterStats,
}

impl Writer {
    pub fn new(
        buffer: BufferReceiver,
        backend: Arc<dyn PersistenceBackend>,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            buffer,
            backend,
            accumulator: Accumulator::new(batch_size, flush_interval),
            stats: WriterStats::default(),
        }
    }

    /// Run until every buffer sender is gone and the buffer is drained
    ///
    /// The partial accumulation is flushed before returning.
    pub async fn run(mut self) -> WriterStats {
        tracing::info!(
            stage = "writer",
            backend = %self.backend.kind(),
            batch_size = self.accumulator.batch_size(),
            "writer started"
        );

        loop {
            let deadline = self.accumulator.deadline();
            tokio::select! {
                next = self.buffer.next() => match next {
                    Some(record) => {
                        if let Some(batch) = self.accumulator.push(record, Instant::now()) {
                            self.flush(batch, "size").await;
                        }
                    }
                    None => break,
                },
                _ = wait_until(deadline) => {
                    if let Some(batch) = self.accumulator.take_due(Instant::now()) {
                        self.flush(batch, "interval").await;
                    }
                }
            }
        }

        if let Some(batch) = self.accumulator.take() {
            self.flush(batch, "shutdown").await;
        }
        tracing::info!(
            stage = "writer",
            batches = self.stats.batches_written,
            records = self.stats.records_written,
            dropped = self.stats.batches_dropped,
            "writer stopped"
        );
        self.stats
    }

    async fn flush(&mut self, batch: Vec<Record>, reason: &'static str) {
        let records = batch.len() as u64;
        match self.backend.write_batch(&batch).await {
            Ok(handle) => {
                self.stats.batches_written += 1;
                self.stats.records_written += records;
                tracing::debug!(
                    stage = "writer",
                    backend = %self.backend.kind(),
                    handle = %handle,
                    records,
                    reason,
                    "batch persisted"
                );
            }
            Err(e) => {
                // Records are not re-enqueued
                self.stats.batches_dropped += 1;
                self.stats.records_dropped += records;
                tracing::error!(
                    stage = "writer",
                    backend = %self.backend.kind(),
                    records,
                    error = %e,
                    "batch dropped after write failure"
                );
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
