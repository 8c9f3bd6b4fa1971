// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed Pending Set
//!
//! One row per record; rows written together share a `batch_id`. The oldest
//! batch is the smallest `batch_id`. The connection is established once at
//! startup and never re-established: after a connection fault every call
//! keeps failing with a read or write error. Rows that are not valid JSON
//! are moved to `quarantined_records` so they never block newer batches.

use crate::blocking;
use async_trait::async_trait;
use mr_core::persistence::payload_from_lines;
use mr_core::{
    BackendKind, BatchHandle, DeliveryError, PendingBatch, PersistenceBackend, PersistenceError,
    Record,
};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub const VENDOR: &str = "sqlite";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS pending_records (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id    INTEGER NOT NULL,
        payload     TEXT    NOT NULL,
        created_at  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_pending_batch
        ON pending_records(batch_id, id);
    CREATE TABLE IF NOT EXISTS quarantined_records (
        id          INTEGER PRIMARY KEY,
        batch_id    INTEGER NOT NULL,
        payload     TEXT    NOT NULL,
        created_at  INTEGER NOT NULL
    );";

/// Database of pending record rows
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    /// Maximum rows handed out by one fetch
    fetch_cap: i64,
}

impl SqliteBackend {
    /// Open the database and ensure the schema exists
    pub fn connect(connection_string: &str, fetch_cap: usize) -> Result<Self, PersistenceError> {
        let connect_err = |e: rusqlite::Error| PersistenceError::Connect {
            vendor: VENDOR.to_string(),
            message: format!("{}: {}", connection_string, e),
        };

        let conn = Connection::open(connection_string).map_err(connect_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(connect_err)?;
        conn.execute_batch(SCHEMA).map_err(connect_err)?;

        tracing::info!(database = connection_string, "database backend connected");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            fetch_cap: i64::try_from(fetch_cap.max(1)).unwrap_or(i64::MAX),
        })
    }
}

#[async_trait]
impl PersistenceBackend for SqliteBackend {
    async fn write_batch(&self, records: &[Record]) -> Result<BatchHandle, PersistenceError> {
        let conn = Arc::clone(&self.conn);
        let payloads: Vec<String> = records.iter().map(|r| r.as_str().to_string()).collect();

        blocking(
            move || {
                let write_err = |e: rusqlite::Error| PersistenceError::Write(e.to_string());
                let mut conn = conn.lock().unwrap_or_else(|e| e.into_inner());
                let tx = conn.transaction().map_err(write_err)?;

                let batch_id: i64 = tx
                    .query_row(
                        "SELECT COALESCE(MAX(batch_id), 0) + 1 FROM pending_records",
                        [],
                        |row| row.get(0),
                    )
                    .map_err(write_err)?;
                let created_at = unix_millis();
                let mut last_row = 0;
                {
                    let mut stmt = tx
                        .prepare_cached(
                            "INSERT INTO pending_records (batch_id, payload, created_at)
                             VALUES (?1, ?2, ?3)",
                        )
                        .map_err(write_err)?;
                    for payload in &payloads {
                        stmt.execute(params![batch_id, payload, created_at])
                            .map_err(write_err)?;
                        last_row = tx.last_insert_rowid();
                    }
                }
                tx.commit().map_err(write_err)?;

                Ok(BatchHandle::Rows { batch_id, last_row })
            },
            PersistenceError::Write,
        )
        .await
    }

    async fn fetch_next(&self) -> Result<Option<PendingBatch>, PersistenceError> {
        let conn = Arc::clone(&self.conn);
        let cap = self.fetch_cap;

        blocking(
            move || {
                let read_err = |e: rusqlite::Error| PersistenceError::Read(e.to_string());
                let mut conn = conn.lock().unwrap_or_else(|e| e.into_inner());
                let rows = conn
                    .prepare_cached(
                        "SELECT id, batch_id, payload FROM pending_records
                         WHERE batch_id = (SELECT MIN(batch_id) FROM pending_records)
                         ORDER BY id
                         LIMIT ?1",
                    )
                    .and_then(|mut stmt| {
                        let rows = stmt
                            .query_map(params![cap], |row| {
                                Ok((
                                    row.get::<_, i64>(0)?,
                                    row.get::<_, i64>(1)?,
                                    row.get::<_, String>(2)?,
                                ))
                            })?
                            .collect::<Result<Vec<_>, _>>();
                        rows
                    })
                    .map_err(read_err)?;

                let (Some((_, batch_id, _)), Some((last_row, _, _))) = (rows.first(), rows.last())
                else {
                    return Ok(None);
                };
                let handle = BatchHandle::Rows {
                    batch_id: *batch_id,
                    last_row: *last_row,
                };

                match payload_from_lines(rows.iter().map(|(_, _, p)| p.as_str())) {
                    Ok((payload, records)) => Ok(Some(PendingBatch {
                        handle,
                        payload,
                        records,
                    })),
                    Err(e) => {
                        quarantine(&mut conn, &handle);
                        Err(PersistenceError::Malformed {
                            handle,
                            reason: e.to_string(),
                        })
                    }
                }
            },
            PersistenceError::Read,
        )
        .await
    }

    async fn clean(
        &self,
        handle: &BatchHandle,
        delivery_error: Option<&DeliveryError>,
    ) -> Result<(), PersistenceError> {
        let BatchHandle::Rows { batch_id, last_row } = *handle else {
            return Err(PersistenceError::Write(format!(
                "handle {} does not belong to the database backend",
                handle
            )));
        };

        if let Some(error) = delivery_error {
            tracing::debug!(batch_id, error = %error, "retaining undelivered batch");
            return Ok(());
        }

        let conn = Arc::clone(&self.conn);
        blocking(
            move || {
                let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
                conn.execute(
                    "DELETE FROM pending_records WHERE batch_id = ?1 AND id <= ?2",
                    params![batch_id, last_row],
                )
                .map(|_| ())
                .map_err(|e| PersistenceError::Write(e.to_string()))
            },
            PersistenceError::Write,
        )
        .await
    }

    async fn pending_count(&self) -> Result<usize, PersistenceError> {
        let conn = Arc::clone(&self.conn);
        blocking(
            move || {
                let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(DISTINCT batch_id) FROM pending_records",
                        [],
                        |row| row.get(0),
                    )
                    .map_err(|e| PersistenceError::Read(e.to_string()))?;
                Ok(usize::try_from(count).unwrap_or(0))
            },
            PersistenceError::Read,
        )
        .await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Database
    }
}

/// Move rows the publisher can never deliver out of the Pending Set
fn quarantine(conn: &mut Connection, handle: &BatchHandle) {
    let BatchHandle::Rows { batch_id, last_row } = *handle else {
        return;
    };
    let moved = conn.transaction().and_then(|tx| {
        tx.execute(
            "INSERT INTO quarantined_records (id, batch_id, payload, created_at)
             SELECT id, batch_id, payload, created_at FROM pending_records
             WHERE batch_id = ?1 AND id <= ?2",
            params![batch_id, last_row],
        )?;
        let rows = tx.execute(
            "DELETE FROM pending_records WHERE batch_id = ?1 AND id <= ?2",
            params![batch_id, last_row],
        )?;
        tx.commit()?;
        Ok(rows)
    });
    match moved {
        Ok(rows) => tracing::error!(batch_id, rows, "malformed batch quarantined"),
        Err(e) => tracing::error!(
            batch_id,
            error = %e,
            "failed to quarantine malformed batch"
        ),
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
