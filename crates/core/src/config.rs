// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay configuration sourced from the environment
//!
//! Every setting has a safe default. A value that cannot be used is reported
//! as a [`ConfigError`] and replaced by its default rather than aborting.

use crate::retry::Retry;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 38355;
pub const DEFAULT_PERSIST_DIRECTORY: &str = "./data";
pub const DEFAULT_QUEUE_LENGTH: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Unusable configuration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid ({reason}), using default")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{missing} is not set, database persistence disabled")]
    IncompleteDatabase { missing: &'static str },
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub vendor: String,
    pub connection_string: String,
}

/// Complete relay configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// TCP port for the ingestion listener
    pub port: u16,
    /// Upstream analytics endpoint; batches only accumulate when unset
    pub upstream_url: Option<String>,
    pub persistence_enabled: bool,
    pub persist_directory: PathBuf,
    pub queue_length: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub publish_interval: Duration,
    pub http_timeout: Duration,
    pub database: Option<DatabaseConfig>,
    pub connect_retry: Retry,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            upstream_url: None,
            persistence_enabled: true,
            persist_directory: PathBuf::from(DEFAULT_PERSIST_DIRECTORY),
            queue_length: DEFAULT_QUEUE_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            database: None,
            connect_retry: Retry::new(DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CONNECT_DELAY),
        }
    }
}

impl RelayConfig {
    /// Load from process environment, logging every rejected value
    pub fn from_env() -> Self {
        let (config, errors) = Self::from_lookup(|var| std::env::var(var).ok());
        for error in &errors {
            tracing::warn!(error = %error, "configuration");
        }
        config
    }

    /// Load using `lookup` to resolve variables
    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<ConfigError>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        let mut config = Self::default();
        let mut env = Env {
            lookup: &lookup,
            errors: &mut errors,
        };

        config.port = env.parse("ADAPTER_PORT").unwrap_or(config.port);
        config.upstream_url = env.text("SP_SERVER_URL");
        config.persistence_enabled = env
            .flag("ENABLE_PERSISTENCE")
            .unwrap_or(config.persistence_enabled);
        if let Some(dir) = env.text("PERSIST_DIRECTORY") {
            config.persist_directory = PathBuf::from(dir);
        }
        config.queue_length = env.positive("QUEUE_LENGTH").unwrap_or(config.queue_length);
        config.batch_size = env.positive("BATCH_SIZE").unwrap_or(config.batch_size);
        config.flush_interval = env
            .positive("FLUSH_INTERVAL_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(config.flush_interval);
        config.publish_interval = env
            .positive("PUBLISH_INTERVAL_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(config.publish_interval);
        config.http_timeout = env
            .positive("HTTP_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(config.http_timeout);

        let attempts = env
            .positive::<u32>("DB_CONNECT_ATTEMPTS")
            .unwrap_or(DEFAULT_CONNECT_ATTEMPTS);
        let delay = env
            .parse::<u64>("DB_CONNECT_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CONNECT_DELAY);
        config.connect_retry = Retry::new(attempts, delay);
        if let Some(deadline) = env.positive::<u64>("DB_CONNECT_DEADLINE_MS") {
            config.connect_retry = config
                .connect_retry
                .with_deadline(Duration::from_millis(deadline));
        }

        config.database = match (env.text("DB_VENDOR"), env.text("DB_CONNECTION_STRING")) {
            (Some(vendor), Some(connection_string)) => Some(DatabaseConfig {
                vendor,
                connection_string,
            }),
            (Some(_), None) => {
                env.errors.push(ConfigError::IncompleteDatabase {
                    missing: "DB_CONNECTION_STRING",
                });
                None
            }
            (None, Some(_)) => {
                env.errors.push(ConfigError::IncompleteDatabase {
                    missing: "DB_VENDOR",
                });
                None
            }
            (None, None) => None,
        };

        (config, errors)
    }
}

struct Env<'a, F> {
    lookup: &'a F,
    errors: &'a mut Vec<ConfigError>,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty trimmed value
    fn text(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&mut self, var: &'static str) -> Option<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.text(var)?;
        match value.parse() {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(ConfigError::Invalid {
                    var,
                    value,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn positive<T>(&mut self, var: &'static str) -> Option<T>
    where
        T: FromStr + Default + PartialEq,
        T::Err: std::fmt::Display,
    {
        let value = self.parse::<T>(var)?;
        if value == T::default() {
            self.errors.push(ConfigError::Invalid {
                var,
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
            return None;
        }
        Some(value)
    }

    fn flag(&mut self, var: &'static str) -> Option<bool> {
        let value = self.text(var)?;
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                self.errors.push(ConfigError::Invalid {
                    var,
                    value,
                    reason: "expected true or false".to_string(),
                });
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
