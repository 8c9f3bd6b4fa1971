// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for black-box relay tests.

#![allow(dead_code)]

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use mr_daemon::protocol::{self, Request, Response};
use tokio::net::TcpStream;

/// A port that was free a moment ago
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe listener");
    listener.local_addr().expect("No local address").port()
}

/// Relay process that is killed when dropped
pub struct RelayGuard {
    pub child: Child,
    pub port: u16,
}

impl RelayGuard {
    /// Start `mrd` on a free port with batches going to `dir`
    pub fn start(dir: &Path, envs: &[(&str, &str)]) -> Self {
        let port = free_port();
        let mut command = Command::new(assert_cmd::cargo::cargo_bin("mrd"));
        command
            .arg(port.to_string())
            .env_remove("SP_SERVER_URL")
            .env_remove("DB_VENDOR")
            .env_remove("DB_CONNECTION_STRING")
            .env("PERSIST_DIRECTORY", dir)
            .env("RUST_LOG", "info")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in envs {
            command.env(key, value);
        }
        let child = command.spawn().expect("Failed to spawn mrd");
        Self { child, port }
    }

    /// Send SIGTERM and wait for the process to exit
    pub fn terminate(mut self) -> std::process::ExitStatus {
        Command::new("kill")
            .args(["-TERM", &self.child.id().to_string()])
            .status()
            .expect("Failed to run kill");
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(status) = self.child.try_wait().expect("Failed to wait for mrd") {
                return status;
            }
            assert!(Instant::now() < deadline, "mrd did not exit after SIGTERM");
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Connect, retrying while the relay starts up
pub async fn connect(port: u16) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => return stream,
            Err(_) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("relay never accepted connections: {}", e),
        }
    }
}

pub async fn send(stream: &mut TcpStream, request: &Request) -> Response {
    let data = protocol::encode(request).expect("encode failed");
    protocol::write_message(stream, &data)
        .await
        .expect("write failed");
    let body = protocol::read_message(stream).await.expect("read failed");
    protocol::decode(&body).expect("decode failed")
}

/// Batch files in `dir`, oldest first
pub fn batch_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "batch"))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

/// Poll until `check` holds or the timeout passes
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    check()
}
