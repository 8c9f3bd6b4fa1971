// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn capacity_is_multiple_of_queue_length() {
    let (tx, _rx) = ingest_buffer(3);
    assert_eq!(tx.capacity(), 3 * BUFFER_MULTIPLIER);
}

#[test]
fn zero_queue_length_still_holds_one_record() {
    let (tx, _rx) = ingest_buffer(0);
    assert_eq!(tx.capacity(), 1);
}

#[tokio::test]
async fn preserves_arrival_order() {
    let (tx, mut rx) = ingest_buffer(1);
    for i in 0..5 {
        tx.ingest(Record::new(format!("{{\"n\":{}}}", i)))
            .await
            .unwrap();
    }
    assert_eq!(tx.len(), 5);

    for i in 0..5 {
        let record = rx.next().await.unwrap();
        assert_eq!(record.as_str(), format!("{{\"n\":{}}}", i));
    }
    assert!(rx.try_next().is_none());
}

#[tokio::test]
async fn full_buffer_blocks_ingest_until_drained() {
    let (tx, mut rx) = ingest_buffer(0);
    tx.ingest(Record::new("{}")).await.unwrap();

    // Second ingest cannot complete while the single slot is taken
    let blocked = tokio::time::timeout(Duration::from_millis(50), tx.ingest(Record::new("{}"))).await;
    assert!(blocked.is_err());

    let producer = {
        let tx = tx.clone();
        tokio::spawn(async move { tx.ingest(Record::new("{\"late\":1}")).await })
    };
    assert_eq!(rx.next().await.unwrap().as_str(), "{}");
    producer.await.unwrap().unwrap();
    assert_eq!(rx.next().await.unwrap().as_str(), "{\"late\":1}");
}

#[tokio::test]
async fn ingest_fails_once_writer_is_gone() {
    let (tx, rx) = ingest_buffer(1);
    drop(rx);
    let err = tx.ingest(Record::new("{}")).await.unwrap_err();
    assert_eq!(err.0.as_str(), "{}");
}

#[tokio::test]
async fn receiver_ends_after_senders_drop() {
    let (tx, mut rx) = ingest_buffer(1);
    tx.ingest(Record::new("{}")).await.unwrap();
    drop(tx);
    assert!(rx.next().await.is_some());
    assert!(rx.next().await.is_none());
}
