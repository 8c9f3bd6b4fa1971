// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed Pending Set
//!
//! Each batch is one file named `<stamp>.batch`, where `stamp` is a
//! zero-padded, strictly increasing nanosecond timestamp, so lexical order is
//! creation order. Files are written under a `.tmp` name and renamed into
//! place, so the publisher never observes a partial batch. On disk a batch is
//! newline-delimited records.

use crate::blocking;
use async_trait::async_trait;
use fs2::FileExt;
use mr_core::persistence::payload_from_lines;
use mr_core::{
    BackendKind, BatchHandle, DeliveryError, PendingBatch, PersistenceBackend, PersistenceError,
    Record,
};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const BATCH_EXT: &str = "batch";
const TEMP_EXT: &str = "tmp";
const CORRUPT_EXT: &str = "corrupt";
const LOCK_FILE: &str = ".lock";

/// Directory of batch files
pub struct FileBackend {
    dir: PathBuf,
    last_stamp: Arc<Mutex<u64>>,
    // NOTE(lifetime): Held to keep the directory exclusive; released on drop
    _lock: File,
}

impl FileBackend {
    /// Open (creating if needed) and lock a batch directory
    pub fn open(dir: &Path) -> Result<Self, PersistenceError> {
        fs::create_dir_all(dir).map_err(|e| {
            PersistenceError::Config(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))
            .map_err(|e| {
                PersistenceError::Config(format!("cannot open lock in {}: {}", dir.display(), e))
            })?;
        lock.try_lock_exclusive().map_err(|e| {
            PersistenceError::Config(format!(
                "{} is in use by another relay: {}",
                dir.display(),
                e
            ))
        })?;

        // Resume after the newest existing batch even if the wall clock moved back
        let last_stamp = batch_files(dir)
            .map_err(|e| PersistenceError::Read(format!("{}: {}", dir.display(), e)))?
            .last()
            .and_then(|path| stamp_of(path))
            .unwrap_or(0);

        let backend = Self {
            dir: dir.to_path_buf(),
            last_stamp: Arc::new(Mutex::new(last_stamp)),
            _lock: lock,
        };
        tracing::info!(
            directory = %dir.display(),
            pending = batch_files(dir).map(|f| f.len()).unwrap_or(0),
            "file backend opened"
        );
        Ok(backend)
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn write_batch(&self, records: &[Record]) -> Result<BatchHandle, PersistenceError> {
        let dir = self.dir.clone();
        let last_stamp = Arc::clone(&self.last_stamp);
        let mut content = String::with_capacity(records.iter().map(|r| r.len() + 1).sum());
        for record in records {
            content.push_str(record.as_str());
            content.push('\n');
        }

        blocking(
            move || {
                let stamp = next_stamp(&last_stamp);
                let name = format!("{:020}", stamp);
                let temp = dir.join(&name).with_extension(TEMP_EXT);
                let path = dir.join(&name).with_extension(BATCH_EXT);

                write_durably(&temp, content.as_bytes())
                    .and_then(|()| fs::rename(&temp, &path))
                    .and_then(|()| sync_dir(&dir))
                    .map_err(|e| {
                        let _ = fs::remove_file(&temp);
                        PersistenceError::Write(format!("{}: {}", path.display(), e))
                    })?;
                Ok(BatchHandle::File(path))
            },
            PersistenceError::Write,
        )
        .await
    }

    async fn fetch_next(&self) -> Result<Option<PendingBatch>, PersistenceError> {
        let dir = self.dir.clone();
        blocking(
            move || {
                let files = batch_files(&dir)
                    .map_err(|e| PersistenceError::Read(format!("{}: {}", dir.display(), e)))?;
                let Some(path) = files.into_iter().next() else {
                    return Ok(None);
                };

                let content = fs::read_to_string(&path)
                    .map_err(|e| PersistenceError::Read(format!("{}: {}", path.display(), e)))?;
                let handle = BatchHandle::File(path.clone());

                let parsed = if content.trim().is_empty() {
                    Err("empty batch file".to_string())
                } else {
                    payload_from_lines(content.lines().filter(|l| !l.is_empty()))
                        .map_err(|e| e.to_string())
                };

                match parsed {
                    Ok((payload, records)) => Ok(Some(PendingBatch {
                        handle,
                        payload,
                        records,
                    })),
                    Err(reason) => {
                        quarantine(&path);
                        Err(PersistenceError::Malformed { handle, reason })
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
        let BatchHandle::File(path) = handle else {
            return Err(PersistenceError::Write(format!(
                "handle {} does not belong to the file backend",
                handle
            )));
        };

        if let Some(error) = delivery_error {
            tracing::debug!(file = %path.display(), error = %error, "retaining undelivered batch");
            return Ok(());
        }

        let path = path.clone();
        blocking(
            move || {
                fs::remove_file(&path).map_err(|e| {
                    PersistenceError::Write(format!("failed to remove {}: {}", path.display(), e))
                })
            },
            PersistenceError::Write,
        )
        .await
    }

    async fn pending_count(&self) -> Result<usize, PersistenceError> {
        let dir = self.dir.clone();
        blocking(
            move || {
                batch_files(&dir)
                    .map(|files| files.len())
                    .map_err(|e| PersistenceError::Read(format!("{}: {}", dir.display(), e)))
            },
            PersistenceError::Read,
        )
        .await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }
}

/// Batch files in creation order
fn batch_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == BATCH_EXT) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn stamp_of(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

fn next_stamp(last: &Mutex<u64>) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
    *last = now.max(*last + 1);
    *last
}

fn write_durably(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Persist directory entries, so a renamed batch survives power loss
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Move a batch the publisher can never deliver out of the Pending Set
fn quarantine(path: &Path) {
    let target = path.with_extension(CORRUPT_EXT);
    match fs::rename(path, &target) {
        Ok(()) => tracing::error!(
            file = %path.display(),
            quarantined = %target.display(),
            "malformed batch quarantined"
        ),
        Err(e) => tracing::error!(
            file = %path.display(),
            error = %e,
            "failed to quarantine malformed batch"
        ),
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
