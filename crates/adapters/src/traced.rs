// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use async_trait::async_trait;
use mr_core::{DeliveryError, Upstream};
use tracing::Instrument;

/// Wrapper that adds tracing to any Upstream
#[derive(Clone)]
pub struct TracedUpstream<U> {
    inner: U,
    target: String,
}

impl<U> TracedUpstream<U> {
    /// `target` names the upstream in every log line (usually its URL)
    pub fn new(inner: U, target: impl Into<String>) -> Self {
        Self {
            inner,
            target: target.into(),
        }
    }

    pub fn inner(&self) -> &U {
        &self.inner
    }
}

#[async_trait]
impl<U: Upstream> Upstream for TracedUpstream<U> {
    async fn deliver(&self, payload: &str) -> Result<(), DeliveryError> {
        let span = tracing::info_span!("upstream.deliver", upstream = %self.target);

        async {
            // Precondition: an empty payload is never a batch
            if payload.is_empty() {
                tracing::error!("refusing to deliver empty payload");
                return Err(DeliveryError::Transport("empty payload".to_string()));
            }

            tracing::debug!(bytes = payload.len(), "delivering");
            let start = std::time::Instant::now();
            let result = self.inner.deliver(payload).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(
                    bytes = payload.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "delivered"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "delivery failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
