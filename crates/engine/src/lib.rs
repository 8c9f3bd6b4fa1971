// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Metrics relay pipeline stages
//!
//! The writer drains the ingestion buffer into batches; the publisher moves
//! the oldest pending batch upstream. They never call each other: the only
//! thing they share is the persistence backend.

mod accumulator;
mod publisher;
mod writer;

pub use accumulator::Accumulator;
pub use publisher::{PublishOutcome, Publisher};
pub use writer::{Writer, WriterStats};
