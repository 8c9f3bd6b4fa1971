// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded ingestion buffer
//!
//! The only hand-off point between ingestion and the writer. Ingesting into a
//! full buffer waits for space; that wait is the relay's only backpressure.
//! Records leave the buffer in arrival order.

use crate::record::Record;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffer capacity is this multiple of the configured queue length
pub const BUFFER_MULTIPLIER: usize = 10;

/// The writer has gone away; the record was not buffered
#[derive(Debug, Error)]
#[error("ingestion buffer closed")]
pub struct BufferClosed(pub Record);

/// Create a buffer sized for `queue_length` and split it into its two ends
pub fn ingest_buffer(queue_length: usize) -> (BufferSender, BufferReceiver) {
    let capacity = queue_length.saturating_mul(BUFFER_MULTIPLIER).max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (BufferSender { tx }, BufferReceiver { rx })
}

/// Producer end, cloned into every ingestion connection
#[derive(Clone, Debug)]
pub struct BufferSender {
    tx: mpsc::Sender<Record>,
}

impl BufferSender {
    /// Enqueue a record, waiting while the buffer is full
    pub async fn ingest(&self, record: Record) -> Result<(), BufferClosed> {
        self.tx.send(record).await.map_err(|e| BufferClosed(e.0))
    }

    /// Fixed capacity chosen at construction
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of records currently waiting for the writer
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer end, owned by the writer
#[derive(Debug)]
pub struct BufferReceiver {
    rx: mpsc::Receiver<Record>,
}

impl BufferReceiver {
    /// Next record in arrival order; `None` once every sender is dropped and
    /// the buffer is drained
    pub async fn next(&mut self) -> Option<Record> {
        self.rx.recv().await
    }

    /// Next record if one is immediately available
    pub fn try_next(&mut self) -> Option<Record> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
