// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP ingestion server and connection handling.

use mr_core::{BufferSender, Record};
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT, IDLE_TIMEOUT};

/// Serve one control-plane connection until the peer closes it
///
/// Requests are answered in order. A malformed frame gets an error response
/// and ends the connection.
pub async fn handle_connection(stream: TcpStream, buffer: BufferSender) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let request = match protocol::read_request(&mut reader, IDLE_TIMEOUT).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("client closed connection");
                return Ok(());
            }
            Err(ProtocolError::Timeout) => {
                debug!("closing idle connection");
                return Ok(());
            }
            Err(e @ (ProtocolError::Json(_) | ProtocolError::MessageTooLarge { .. })) => {
                warn!(error = %e, "rejecting malformed request");
                let response = Response::Error {
                    message: e.to_string(),
                };
                protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
                return Err(ServerError::Protocol(e));
            }
            Err(e) => return Err(ServerError::Protocol(e)),
        };

        let response = handle_request(request, &buffer).await;
        protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    }
}

/// Handle a single request and return a response
///
/// Metric batches are always reported as accepted; a record that cannot be
/// buffered is logged, never surfaced to the caller.
pub async fn handle_request(request: Request, buffer: &BufferSender) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::HandleMetric { instances } => {
            let mut ingested = 0usize;
            for instance in &instances {
                let record = Record::from_instance(instance);
                if let Err(e) = buffer.ingest(record).await {
                    warn!(
                        stage = "ingest",
                        error = %e,
                        dropped = instances.len() - ingested,
                        "writer gone, dropping remaining instances"
                    );
                    break;
                }
                ingested += 1;
            }
            debug!(stage = "ingest", instances = instances.len(), ingested, "metric batch handled");
            Response::Report
        }
    }
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
