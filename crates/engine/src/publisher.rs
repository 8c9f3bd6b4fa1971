// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publisher stage: oldest pending batch to the upstream
//!
//! One batch per tick, always the oldest. A batch that fails delivery stays
//! oldest and blocks newer ones until it goes through.

use mr_core::{BatchHandle, DeliveryError, PersistenceBackend, Upstream};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, MissedTickBehavior};

/// What one publish cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing pending
    Idle,
    /// Delivered and removed from the pending set
    Delivered { handle: BatchHandle, records: usize },
    /// Delivery failed; the batch stays pending
    Retained {
        handle: BatchHandle,
        error: DeliveryError,
    },
    /// The backend could not produce a batch this cycle
    FetchFailed,
    /// Delivered, but removal failed, so the batch will be sent again
    CleanFailed { handle: BatchHandle },
}

pub struct Publisher {
    backend: Arc<dyn PersistenceBackend>,
    upstream: Arc<dyn Upstream>,
    interval: Duration,
}

impl Publisher {
    pub fn new(
        backend: Arc<dyn PersistenceBackend>,
        upstream: Arc<dyn Upstream>,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            upstream,
            interval,
        }
    }

    /// Fetch the oldest pending batch, deliver it, and confirm the outcome
    pub async fn publish_once(&self) -> PublishOutcome {
        let batch = match self.backend.fetch_next().await {
            Ok(Some(batch)) => batch,
            Ok(None) => return PublishOutcome::Idle,
            Err(e) => {
                tracing::warn!(
                    stage = "publisher",
                    backend = %self.backend.kind(),
                    error = %e,
                    "fetch failed, treating as none pending"
                );
                return PublishOutcome::FetchFailed;
            }
        };

        let delivery = self.upstream.deliver(&batch.payload).await;
        if let Err(e) = self
            .backend
            .clean(&batch.handle, delivery.as_ref().err())
            .await
        {
            tracing::error!(
                stage = "publisher",
                backend = %self.backend.kind(),
                handle = %batch.handle,
                error = %e,
                "failed to confirm batch"
            );
            if delivery.is_ok() {
                return PublishOutcome::CleanFailed {
                    handle: batch.handle,
                };
            }
        }

        match delivery {
            Ok(()) => {
                tracing::info!(
                    stage = "publisher",
                    handle = %batch.handle,
                    records = batch.records,
                    "batch published"
                );
                PublishOutcome::Delivered {
                    handle: batch.handle,
                    records: batch.records,
                }
            }
            Err(error) => {
                tracing::warn!(
                    stage = "publisher",
                    handle = %batch.handle,
                    records = batch.records,
                    error = %error,
                    "batch retained for next tick"
                );
                PublishOutcome::Retained {
                    handle: batch.handle,
                    error,
                }
            }
        }
    }

    /// Publish once per interval until `shutdown` turns true or its sender
    /// is dropped
    ///
    /// The first cycle runs one full interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Some(first_tick) = Instant::now().checked_add(self.interval) else {
            tracing::warn!(
                stage = "publisher",
                interval_s = self.interval.as_secs(),
                "publish interval out of range, nothing will be published"
            );
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            return;
        };
        let mut ticker = tokio::time::interval_at(first_tick, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            stage = "publisher",
            interval_ms = self.interval.as_millis() as u64,
            "publisher started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.publish_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(stage = "publisher", "publisher stopped");
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
