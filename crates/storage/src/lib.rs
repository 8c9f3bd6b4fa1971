// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable persistence backends and startup backend selection

mod file;
mod select;
mod sqlite;

pub use file::FileBackend;
pub use select::{select_backend, Selection};
pub use sqlite::SqliteBackend;

use mr_core::PersistenceError;

/// Run blocking storage work off the async executor
async fn blocking<T, F>(
    work: F,
    on_join: fn(String) -> PersistenceError,
) -> Result<T, PersistenceError>
where
    F: FnOnce() -> Result<T, PersistenceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| on_join(e.to_string()))?
}
