// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure batching state for the writer
//!
//! Holds the in-progress accumulation and decides when it must be flushed.
//! Time is passed in by the caller so the decisions are deterministic.

use mr_core::Record;
use tokio::time::{Duration, Instant};

/// In-progress accumulation with size and age thresholds
#[derive(Debug)]
pub struct Accumulator {
    records: Vec<Record>,
    /// When the first record of the current accumulation arrived
    started: Option<Instant>,
    batch_size: usize,
    flush_interval: Duration,
}

impl Accumulator {
    /// A zero batch size is treated as one
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            records: Vec::with_capacity(batch_size),
            started: None,
            batch_size,
            flush_interval,
        }
    }

    /// Append a record; returns the batch to flush if a threshold was reached
    pub fn push(&mut self, record: Record, now: Instant) -> Option<Vec<Record>> {
        let started = *self.started.get_or_insert(now);
        self.records.push(record);

        let full = self.records.len() >= self.batch_size;
        let aged = now.saturating_duration_since(started) >= self.flush_interval;
        if full || aged {
            self.take()
        } else {
            None
        }
    }

    /// Instant at which the current accumulation becomes due, if any
    ///
    /// An interval too large to represent as an instant never falls due.
    pub fn deadline(&self) -> Option<Instant> {
        self.started
            .and_then(|started| started.checked_add(self.flush_interval))
    }

    /// Take the accumulation if its window has elapsed
    ///
    /// Returns `None` for an empty accumulation, so a timer firing with
    /// nothing accumulated never yields an empty batch.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<Record>> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    /// Take whatever has accumulated, regardless of thresholds
    pub fn take(&mut self) -> Option<Vec<Record>> {
        self.started = None;
        if self.records.is_empty() {
            return None;
        }
        Some(std::mem::replace(
            &mut self.records,
            Vec::with_capacity(self.batch_size),
        ))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
#[path = "accumulator_tests.rs"]
mod tests;
