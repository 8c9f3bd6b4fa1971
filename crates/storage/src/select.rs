// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup backend selection
//!
//! Decided once per process: database when configured and reachable within
//! the retry budget, otherwise files; in-memory only when persistence is
//! disabled or the batch directory is unusable.

use crate::file::FileBackend;
use crate::sqlite::{SqliteBackend, VENDOR};
use mr_core::{BackendKind, MemoryBackend, PersistenceBackend, PersistenceError, RelayConfig};
use std::sync::Arc;

/// Outcome of backend selection
pub struct Selection {
    pub backend: Arc<dyn PersistenceBackend>,
    /// Database connection attempts made while selecting
    pub connect_attempts: u32,
    /// Why a more preferred backend was not used
    pub fallback: Option<PersistenceError>,
}

impl Selection {
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            connect_attempts: 0,
            fallback: None,
        }
    }
}

/// Choose the backend for this process
pub async fn select_backend(config: &RelayConfig) -> Selection {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, pending batches are kept in memory only");
        return Selection::new(Arc::new(MemoryBackend::new()));
    }

    let mut connect_attempts = 0;
    let mut fallback = None;

    if let Some(db) = &config.database {
        if db.vendor.eq_ignore_ascii_case(VENDOR) {
            let dsn = db.connection_string.clone();
            let cap = config.batch_size;
            let result = config
                .connect_retry
                .run("database connect", || {
                    connect_attempts += 1;
                    let dsn = dsn.clone();
                    async move {
                        tokio::task::spawn_blocking(move || SqliteBackend::connect(&dsn, cap))
                            .await
                            .map_err(|e| PersistenceError::Connect {
                                vendor: VENDOR.to_string(),
                                message: e.to_string(),
                            })
                            .and_then(|connected| connected)
                    }
                })
                .await;

            match result {
                Ok(backend) => {
                    tracing::info!(backend = %BackendKind::Database, connect_attempts, "persistence backend selected");
                    return Selection {
                        backend: Arc::new(backend),
                        connect_attempts,
                        fallback: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, connect_attempts, "database unreachable, falling back to files");
                    fallback = Some(e);
                }
            }
        } else {
            let e = PersistenceError::Config(format!("unsupported database vendor {:?}", db.vendor));
            tracing::warn!(error = %e, "falling back to files");
            fallback = Some(e);
        }
    }

    match FileBackend::open(&config.persist_directory) {
        Ok(backend) => {
            tracing::info!(
                backend = %BackendKind::File,
                directory = %config.persist_directory.display(),
                "persistence backend selected"
            );
            Selection {
                backend: Arc::new(backend),
                connect_attempts,
                fallback,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "batch directory unusable, persistence disabled");
            Selection {
                backend: Arc::new(MemoryBackend::new()),
                connect_attempts,
                fallback: Some(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "select_tests.rs"]
mod tests;
