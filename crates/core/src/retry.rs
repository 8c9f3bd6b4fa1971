// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with a fixed delay
//!
//! No backoff and no jitter: the operation is attempted up to `attempts`
//! times with the same pause in between. An optional overall deadline stops
//! the loop early when the next pause would cross it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    pub attempts: u32,
    pub delay: Duration,
    pub deadline: Option<Duration>,
}

impl Retry {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            deadline: None,
        }
    }

    /// Bound the total time spent, pauses included
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run `op` until it succeeds or the policy is exhausted
    ///
    /// Returns the first success, or the last error. At least one attempt is
    /// always made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let start = Instant::now();
        let mut attempt = 1;

        loop {
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt >= attempts {
                tracing::warn!(label, attempts, error = %err, "retries exhausted");
                return Err(err);
            }

            if let Some(deadline) = self.deadline {
                if start.elapsed() + self.delay > deadline {
                    tracing::warn!(
                        label,
                        attempt,
                        deadline_ms = deadline.as_millis() as u64,
                        error = %err,
                        "retry deadline reached"
                    );
                    return Err(err);
                }
            }

            tracing::warn!(
                label,
                attempt,
                attempts,
                delay_ms = self.delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

/// Shorthand for [`Retry::run`] without a deadline
pub async fn retry<T, E, F, Fut>(attempts: u32, delay: Duration, label: &str, op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    Retry::new(attempts, delay).run(label, op).await
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
