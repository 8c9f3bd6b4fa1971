// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::upstream::FakeUpstream;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::new();
    let logs_clone = logs.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs_clone)
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

#[tokio::test]
async fn traced_upstream_rejects_empty_payload() {
    let fake = FakeUpstream::new();
    let traced = TracedUpstream::new(fake.clone(), "http://sp/metrics");

    let result = traced.deliver("").await;

    assert!(matches!(result, Err(DeliveryError::Transport(_))));
    assert!(fake.payloads().is_empty(), "inner upstream must not be called");
}

#[tokio::test]
async fn traced_upstream_passes_outcome_through() {
    let fake = FakeUpstream::new();
    fake.push_outcome(Err(DeliveryError::Rejected { status: 502 }));
    let traced = TracedUpstream::new(fake.clone(), "http://sp/metrics");

    assert_eq!(
        traced.deliver("[1]").await,
        Err(DeliveryError::Rejected { status: 502 })
    );
    assert_eq!(traced.deliver("[2]").await, Ok(()));
    assert_eq!(traced.inner().payloads(), vec!["[1]", "[2]"]);
}

#[test]
fn traced_upstream_logs_success_with_target() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedUpstream::new(FakeUpstream::new(), "http://sp/metrics");
        traced.deliver("[{\"a\":1}]").await
    });

    assert_eq!(result, Ok(()));
    assert!(logs.contains("upstream.deliver"), "span missing: {}", logs);
    assert!(logs.contains("http://sp/metrics"), "target missing: {}", logs);
    assert!(logs.contains("delivered"), "completion missing: {}", logs);
}

#[test]
fn traced_upstream_logs_failure_reason() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeUpstream::new();
        fake.push_outcome(Err(DeliveryError::Transport("connection refused".to_string())));
        TracedUpstream::new(fake, "http://sp/metrics")
            .deliver("[]")
            .await
    });

    assert!(result.is_err());
    assert!(logs.contains("delivery failed"), "failure missing: {}", logs);
    assert!(logs.contains("connection refused"), "reason missing: {}", logs);
}
