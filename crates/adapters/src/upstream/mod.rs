// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream analytics server adapters

mod http;

pub use http::HttpUpstream;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeUpstream;
#[cfg(any(test, feature = "test-support"))]
mod stub;
#[cfg(any(test, feature = "test-support"))]
pub use stub::StubServer;
