// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake upstream for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use mr_core::{DeliveryError, Upstream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    delivered: Vec<String>,
    script: VecDeque<Result<(), DeliveryError>>,
}

/// Records every payload and answers from a script, accepting once the
/// script runs out
#[derive(Clone, Default)]
pub struct FakeUpstream {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next delivery
    pub fn push_outcome(&self, outcome: Result<(), DeliveryError>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .script
            .push_back(outcome);
    }

    /// Every payload received, accepted or not
    pub fn payloads(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .delivered
            .clone()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn deliver(&self, payload: &str) -> Result<(), DeliveryError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.delivered.push(payload.to_string());
        inner.script.pop_front().unwrap_or(Ok(()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
