// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box tests against the mrd binary

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(deprecated)]

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use assert_cmd::Command;
use common::{batch_files, connect, send, wait_for, RelayGuard};
use mr_core::{DimensionValue, InstanceMsg, TypedValue, WireDuration};
use mr_daemon::protocol::{Request, Response};
use predicates::prelude::*;

fn request_with_latency(seconds: i64, nanos: i32) -> Request {
    Request::HandleMetric {
        instances: vec![InstanceMsg {
            name: "requestcount".to_string(),
            dimensions: BTreeMap::from([
                (
                    "responseDuration".to_string(),
                    DimensionValue::Typed(TypedValue::DurationValue(WireDuration {
                        seconds,
                        nanos,
                    })),
                ),
                (
                    "sourceIP".to_string(),
                    DimensionValue::Typed(TypedValue::IpAddressValue(vec![10, 0, 0, 7])),
                ),
            ]),
        }],
    }
}

#[test]
fn port_in_use_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    Command::cargo_bin("mrd")
        .unwrap()
        .arg(port.to_string())
        .env("PERSIST_DIRECTORY", dir.path())
        .env_remove("SP_SERVER_URL")
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed to start relay"));
}

#[test]
fn invalid_port_argument_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("mrd")
        .unwrap()
        .arg("seventy")
        .env("PERSIST_DIRECTORY", dir.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Invalid port argument"));
}

#[tokio::test]
async fn duration_dimension_is_persisted_as_nanoseconds() {
    let dir = tempfile::tempdir().unwrap();
    let relay = RelayGuard::start(dir.path(), &[("BATCH_SIZE", "1")]);

    let mut stream = connect(relay.port).await;
    assert_eq!(send(&mut stream, &Request::Ping).await, Response::Pong);
    assert_eq!(
        send(&mut stream, &request_with_latency(1, 5)).await,
        Response::Report
    );

    assert!(
        wait_for(Duration::from_secs(10), || batch_files(dir.path()).len() == 1),
        "no batch file appeared"
    );
    let content = std::fs::read_to_string(&batch_files(dir.path())[0]).unwrap();
    assert_eq!(
        content,
        "{\"responseDuration\":1000000005,\"sourceIP\":\"10.0.0.7\"}\n"
    );
}

#[tokio::test]
async fn sigterm_flushes_partial_batch() {
    let dir = tempfile::tempdir().unwrap();
    let relay = RelayGuard::start(
        dir.path(),
        &[("BATCH_SIZE", "50"), ("FLUSH_INTERVAL_SECONDS", "3600")],
    );

    let mut stream = connect(relay.port).await;
    for nanos in [1, 2] {
        assert_eq!(
            send(&mut stream, &request_with_latency(0, nanos)).await,
            Response::Report
        );
    }
    assert!(batch_files(dir.path()).is_empty());

    let status = relay.terminate();

    assert!(status.success(), "mrd exited with {}", status);
    let files = batch_files(dir.path());
    assert_eq!(files.len(), 1);
    let content = std::fs::read_to_string(&files[0]).unwrap();
    assert_eq!(content.lines().count(), 2);
}
