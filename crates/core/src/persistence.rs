// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence backend capability
//!
//! A backend holds the Pending Set: batches written by the writer and not yet
//! confirmed delivered by the publisher. Batches are handed out oldest first
//! and are removed only when [`PersistenceBackend::clean`] is called without a
//! delivery error.

use crate::record::Record;
use crate::upstream::DeliveryError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which backend was selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    File,
    Database,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::File => write!(f, "file"),
            BackendKind::Database => write!(f, "database"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

/// Identifies one persisted batch for later confirmation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatchHandle {
    /// A batch file
    File(PathBuf),
    /// Rows sharing a batch id, up to and including `last_row`
    Rows { batch_id: i64, last_row: i64 },
    /// In-memory sequence number
    Memory(u64),
}

impl fmt::Display for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchHandle::File(path) => write!(f, "{}", path.display()),
            BatchHandle::Rows { batch_id, last_row } => {
                write!(f, "batch {} (rows <= {})", batch_id, last_row)
            }
            BatchHandle::Memory(seq) => write!(f, "memory batch {}", seq),
        }
    }
}

/// The oldest pending batch, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBatch {
    pub handle: BatchHandle,
    /// Delivery payload: a JSON array of the batch's records
    pub payload: String,
    pub records: usize,
}

/// Errors raised by persistence backends
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write batch: {0}")]
    Write(String),

    #[error("failed to read pending batches: {0}")]
    Read(String),

    #[error("malformed batch {handle}: {reason}")]
    Malformed { handle: BatchHandle, reason: String },

    #[error("failed to connect to {vendor} database: {message}")]
    Connect { vendor: String, message: String },

    #[error("invalid persistence configuration: {0}")]
    Config(String),
}

/// Durable storage for batches awaiting delivery
///
/// Mutated concurrently by exactly two actors: the writer inserts, the
/// publisher reads and deletes.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Durably store one batch; the batch becomes the newest pending entry
    async fn write_batch(&self, records: &[Record]) -> Result<BatchHandle, PersistenceError>;

    /// The oldest pending batch, or `None` when nothing is pending
    async fn fetch_next(&self) -> Result<Option<PendingBatch>, PersistenceError>;

    /// Remove the batch if it was delivered, otherwise leave it untouched
    async fn clean(
        &self,
        handle: &BatchHandle,
        delivery_error: Option<&DeliveryError>,
    ) -> Result<(), PersistenceError>;

    /// Number of batches currently pending
    async fn pending_count(&self) -> Result<usize, PersistenceError>;

    fn kind(&self) -> BackendKind;
}

/// Join records into the JSON array delivered upstream
///
/// Each record must itself be JSON text; anything else is reported as the
/// offending record's error.
pub fn payload_from_lines<'a, I>(lines: I) -> Result<(String, usize), serde_json::Error>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values = Vec::new();
    for line in lines {
        values.push(serde_json::from_str::<serde_json::Value>(line)?);
    }
    let count = values.len();
    Ok((serde_json::Value::Array(values).to_string(), count))
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
