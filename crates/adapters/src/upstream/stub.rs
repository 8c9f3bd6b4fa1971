// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stub HTTP server for delivery tests
#![cfg_attr(coverage_nightly, coverage(off))]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

/// Answers one request per scripted status, then stops listening
///
/// Once the script is exhausted the listener is closed, so later deliveries
/// fail with a transport error.
pub struct StubServer {
    url: String,
    handle: JoinHandle<Vec<String>>,
}

impl StubServer {
    pub fn start(statuses: Vec<u16>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}/metrics", listener.local_addr()?);
        let handle = std::thread::spawn(move || {
            let mut bodies = Vec::new();
            for status in statuses {
                let Ok((stream, _)) = listener.accept() else {
                    break;
                };
                if let Ok(body) = answer(stream, status) {
                    bodies.push(body);
                }
            }
            bodies
        });
        Ok(Self { url, handle })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the script to finish and return the received bodies
    pub fn finish(self) -> Vec<String> {
        self.handle.join().unwrap_or_default()
    }
}

fn answer(stream: TcpStream, status: u16) -> std::io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    let mut stream = reader.into_inner();
    write!(
        stream,
        "HTTP/1.1 {} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status
    )?;
    stream.flush()?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}
