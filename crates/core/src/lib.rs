// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mr-core: Core library for the metrics relay (mr)
//!
//! This crate provides:
//! - The record model and projection of metric instances into records
//! - The bounded ingestion buffer shared by ingestion and the writer
//! - Capability traits for persistence backends and the upstream sink
//! - A bounded retry helper used at startup
//! - Environment-sourced configuration

pub mod buffer;
pub mod config;
pub mod memory;
pub mod persistence;
pub mod record;
pub mod retry;
pub mod upstream;

// Re-exports
pub use buffer::{ingest_buffer, BufferClosed, BufferReceiver, BufferSender, BUFFER_MULTIPLIER};
pub use config::{ConfigError, DatabaseConfig, RelayConfig};
pub use memory::MemoryBackend;
pub use persistence::{BackendKind, BatchHandle, PendingBatch, PersistenceBackend, PersistenceError};
pub use record::{DimensionValue, InstanceMsg, Record, TypedValue, WireDuration};
pub use retry::{retry, Retry};
pub use upstream::{DeliveryError, Upstream};
