// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

const SAMPLE: &str = "{\"contextReporterKind\":\"inbound\",\"requestMethod\":\"POST\",\"responseCode\":200}";

fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::new(format!("{{\"seq\":{}}}", i)))
        .collect()
}

fn open_temp() -> (TempDir, FileBackend) {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::open(dir.path()).unwrap();
    (dir, backend)
}

#[tokio::test]
async fn empty_directory_has_nothing_pending() {
    let (_dir, backend) = open_temp();
    assert!(backend.fetch_next().await.unwrap().is_none());
    assert_eq!(backend.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn write_creates_one_newline_delimited_file() {
    let (dir, backend) = open_temp();
    let handle = backend
        .write_batch(&[Record::new(SAMPLE), Record::new(SAMPLE)])
        .await
        .unwrap();

    let BatchHandle::File(path) = &handle else {
        panic!("expected file handle, got {:?}", handle);
    };
    assert_eq!(path.parent(), Some(dir.path()));
    assert_eq!(path.extension().unwrap(), "batch");
    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content, format!("{}\n{}\n", SAMPLE, SAMPLE));

    // No temp files left behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn directory_sync_requires_existing_directory() {
    let dir = TempDir::new().unwrap();
    sync_dir(dir.path()).unwrap();
    assert!(sync_dir(&dir.path().join("missing")).is_err());
}

#[tokio::test]
async fn fetch_returns_oldest_batch_as_json_array() {
    let (_dir, backend) = open_temp();
    let first = backend.write_batch(&records(2)).await.unwrap();
    backend.write_batch(&[Record::new(SAMPLE)]).await.unwrap();

    let batch = backend.fetch_next().await.unwrap().unwrap();
    assert_eq!(batch.handle, first);
    assert_eq!(batch.payload, "[{\"seq\":0},{\"seq\":1}]");
    assert_eq!(batch.records, 2);
}

#[tokio::test]
async fn confirmed_batch_never_reappears() {
    let (_dir, backend) = open_temp();
    let first = backend.write_batch(&records(1)).await.unwrap();
    let second = backend.write_batch(&records(3)).await.unwrap();

    let batch = backend.fetch_next().await.unwrap().unwrap();
    backend.clean(&batch.handle, None).await.unwrap();

    let BatchHandle::File(path) = &first else {
        panic!("expected file handle");
    };
    assert!(!path.exists());
    let next = backend.fetch_next().await.unwrap().unwrap();
    assert_eq!(next.handle, second);
    assert_eq!(backend.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn failed_delivery_leaves_batch_for_next_fetch() {
    let (_dir, backend) = open_temp();
    backend.write_batch(&records(2)).await.unwrap();
    backend.write_batch(&records(1)).await.unwrap();

    let batch = backend.fetch_next().await.unwrap().unwrap();
    backend
        .clean(
            &batch.handle,
            Some(&DeliveryError::Transport("connection refused".to_string())),
        )
        .await
        .unwrap();

    assert_eq!(backend.fetch_next().await.unwrap().unwrap(), batch);
    assert_eq!(backend.pending_count().await.unwrap(), 2);
}

#[tokio::test]
async fn file_names_sort_in_creation_order() {
    let (_dir, backend) = open_temp();
    let mut handles = Vec::new();
    for _ in 0..20 {
        handles.push(backend.write_batch(&records(1)).await.unwrap());
    }
    let mut sorted = handles.clone();
    sorted.sort_by_key(|h| h.to_string());
    assert_eq!(handles, sorted);
}

#[tokio::test]
async fn reopened_directory_keeps_pending_batches() {
    let dir = TempDir::new().unwrap();
    let first = {
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.write_batch(&records(2)).await.unwrap()
    };

    let backend = FileBackend::open(dir.path()).unwrap();
    let later = backend.write_batch(&records(1)).await.unwrap();
    assert!(later.to_string() > first.to_string());
    assert_eq!(backend.fetch_next().await.unwrap().unwrap().handle, first);
}

#[tokio::test]
async fn directory_is_exclusive_to_one_backend() {
    let (dir, _backend) = open_temp();
    let second = FileBackend::open(dir.path());
    assert!(matches!(second, Err(PersistenceError::Config(_))));
}

#[tokio::test]
async fn empty_file_is_quarantined_not_fatal() {
    let (dir, backend) = open_temp();
    let bad = dir.path().join("00000000000000000001.batch");
    std::fs::write(&bad, "").unwrap();
    backend.write_batch(&records(1)).await.unwrap();

    let err = backend.fetch_next().await.unwrap_err();
    assert!(matches!(err, PersistenceError::Malformed { .. }));
    assert!(!bad.exists());
    assert!(bad.with_extension("corrupt").exists());

    // The next fetch moves on to the good batch
    let batch = backend.fetch_next().await.unwrap().unwrap();
    assert_eq!(batch.records, 1);
}

#[tokio::test]
async fn non_json_line_is_malformed() {
    let (dir, backend) = open_temp();
    std::fs::write(dir.path().join("00000000000000000001.batch"), "{\"a\":1}\nnot json\n").unwrap();

    let err = backend.fetch_next().await.unwrap_err();
    assert!(matches!(err, PersistenceError::Malformed { .. }));
    assert!(backend.fetch_next().await.unwrap().is_none());
}

#[tokio::test]
async fn unreadable_directory_is_read_error() {
    let (dir, backend) = open_temp();
    std::fs::remove_dir_all(dir.path()).unwrap();

    let err = backend.fetch_next().await.unwrap_err();
    assert!(matches!(err, PersistenceError::Read(_)));
}

#[tokio::test]
async fn missing_directory_is_write_error() {
    let (dir, backend) = open_temp();
    std::fs::remove_dir_all(dir.path()).unwrap();

    let err = backend.write_batch(&records(1)).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Write(_)));
}

#[tokio::test]
async fn cleaning_missing_file_is_reported() {
    let (dir, backend) = open_temp();
    let handle = BatchHandle::File(dir.path().join("00000000000000000009.batch"));
    assert!(backend.clean(&handle, None).await.is_err());
}
