// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP upstream: POSTs each batch payload to a fixed URL

use async_trait::async_trait;
use mr_core::{DeliveryError, Upstream};
use std::time::Duration;
use ureq::Agent;

/// Delivers batches with a blocking HTTP client on a worker thread
#[derive(Clone)]
pub struct HttpUpstream {
    url: String,
    agent: Agent,
}

impl HttpUpstream {
    /// Client for `url`; a single delivery may take at most `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            url: url.into(),
            agent: Agent::new_with_config(config),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn deliver(&self, payload: &str) -> Result<(), DeliveryError> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        let body = payload.to_string();

        tokio::task::spawn_blocking(move || post(&agent, &url, &body))
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
    }
}

fn post(agent: &Agent, url: &str, body: &str) -> Result<(), DeliveryError> {
    let response = agent
        .post(url)
        .header("Content-Type", "application/json")
        .send(body)
        .map_err(|e| DeliveryError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
