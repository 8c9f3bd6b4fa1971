// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream sink capability

use async_trait::async_trait;
use thiserror::Error;

/// Why a batch was not accepted upstream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("upstream rejected batch with status {status}")]
    Rejected { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Receives batch payloads
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Deliver one payload; `Ok` only on positive confirmation
    async fn deliver(&self, payload: &str) -> Result<(), DeliveryError>;
}
