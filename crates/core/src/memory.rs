// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Non-durable backend used when persistence is disabled

use crate::persistence::{payload_from_lines, BackendKind, BatchHandle, PendingBatch};
use crate::persistence::{PersistenceBackend, PersistenceError};
use crate::record::Record;
use crate::upstream::DeliveryError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    next_seq: u64,
    pending: VecDeque<(u64, Vec<Record>)>,
}

/// Pending Set held in process memory; lost on restart
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of every pending batch, oldest first
    pub fn batches(&self) -> Vec<Vec<Record>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn write_batch(&self, records: &[Record]) -> Result<BatchHandle, PersistenceError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending.push_back((seq, records.to_vec()));
        Ok(BatchHandle::Memory(seq))
    }

    async fn fetch_next(&self) -> Result<Option<PendingBatch>, PersistenceError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some((seq, records)) = inner.pending.front() else {
            return Ok(None);
        };
        let handle = BatchHandle::Memory(*seq);
        let (payload, records) = payload_from_lines(records.iter().map(Record::as_str))
            .map_err(|e| PersistenceError::Malformed {
                handle: handle.clone(),
                reason: e.to_string(),
            })?;
        Ok(Some(PendingBatch {
            handle,
            payload,
            records,
        }))
    }

    async fn clean(
        &self,
        handle: &BatchHandle,
        delivery_error: Option<&DeliveryError>,
    ) -> Result<(), PersistenceError> {
        if delivery_error.is_some() {
            return Ok(());
        }
        let BatchHandle::Memory(seq) = handle else {
            return Err(PersistenceError::Read(format!(
                "handle {} does not belong to the memory backend",
                handle
            )));
        };
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.retain(|(s, _)| s != seq);
        Ok(())
    }

    async fn pending_count(&self) -> Result<usize, PersistenceError> {
        Ok(self.inner.lock().unwrap_or_else(|e| e.into_inner()).pending.len())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
