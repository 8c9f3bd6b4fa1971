// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Metrics relay daemon (mrd)
//!
//! The protocol module is public so clients and tests can speak to a running
//! relay.

pub mod lifecycle;
pub mod protocol;
pub mod server;
