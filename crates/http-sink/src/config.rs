// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sink configuration: caller overrides, environment defaults, validation.
//!
//! Resolution order for every tunable: built-in default, then the
//! `HTTP_SINK_*` environment variable when set, then the explicit
//! [`SinkOptions`] field when `Some`. Malformed environment values fail
//! resolution rather than falling back silently.

use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::errors::{noop_handler, ConfigError, ErrorHandler};

pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 5;
pub const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 1024 * 1024;

pub const ENV_ENDPOINT: &str = "HTTP_SINK_ENDPOINT";
pub const ENV_BUFFER_CAPACITY: &str = "HTTP_SINK_BUFFER_CAPACITY";
pub const ENV_BATCH_SIZE: &str = "HTTP_SINK_BATCH_SIZE";
pub const ENV_MAX_IDLE_CONNECTIONS: &str = "HTTP_SINK_MAX_IDLE_CONNECTIONS";
/// Idle connection timeout, in whole seconds.
pub const ENV_IDLE_CONN_TIMEOUT: &str = "HTTP_SINK_IDLE_CONN_TIMEOUT";
pub const ENV_WRITE_BUFFER_SIZE: &str = "HTTP_SINK_WRITE_BUFFER_SIZE";

/// Caller-supplied overrides for sink construction.
///
/// Every field defaults to `None`, meaning "use the environment value or the
/// built-in default".
#[derive(Clone, Default)]
pub struct SinkOptions {
    /// Bound of the intake queue; producers block once it fills.
    pub buffer_capacity: Option<usize>,
    /// Maximum number of records per outbound POST.
    pub batch_size: Option<usize>,
    /// Observer for asynchronous delivery failures.
    pub error_handler: Option<ErrorHandler>,
    /// Passed through to the HTTP client's connection pool.
    pub max_idle_connections: Option<usize>,
    /// Passed through to the HTTP client's connection pool.
    pub idle_conn_timeout: Option<Duration>,
    /// Preallocation bound for the per-batch payload buffer.
    pub write_buffer_size: Option<usize>,
}

/// Immutable snapshot of tunables captured at sink construction.
///
/// Never mutated afterwards; concurrent sink instances hold independent
/// configurations.
#[derive(Clone)]
pub struct SinkConfig {
    pub endpoint: Url,
    pub buffer_capacity: usize,
    pub batch_size: usize,
    pub error_handler: ErrorHandler,
    pub max_idle_connections: usize,
    pub idle_conn_timeout: Duration,
    pub write_buffer_size: usize,
}

impl SinkConfig {
    /// Resolves a configuration snapshot from defaults, environment, and
    /// explicit options, in that precedence order.
    ///
    /// An explicit `endpoint` beats `HTTP_SINK_ENDPOINT`; one of the two must
    /// be present and parse as a URL.
    pub fn resolve(
        endpoint: Option<&str>,
        options: SinkOptions,
    ) -> Result<SinkConfig, ConfigError> {
        let endpoint = match endpoint {
            Some(value) if !value.is_empty() => parse_endpoint(value)?,
            _ => match env_var(ENV_ENDPOINT) {
                Some(value) => parse_endpoint(&value)?,
                None => return Err(ConfigError::MissingEndpoint),
            },
        };

        let config = SinkConfig {
            endpoint,
            buffer_capacity: options
                .buffer_capacity
                .or(env_usize(ENV_BUFFER_CAPACITY)?)
                .unwrap_or(DEFAULT_BUFFER_CAPACITY),
            batch_size: options
                .batch_size
                .or(env_usize(ENV_BATCH_SIZE)?)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            error_handler: options.error_handler.unwrap_or_else(noop_handler),
            max_idle_connections: options
                .max_idle_connections
                .or(env_usize(ENV_MAX_IDLE_CONNECTIONS)?)
                .unwrap_or(DEFAULT_MAX_IDLE_CONNECTIONS),
            idle_conn_timeout: options
                .idle_conn_timeout
                .or(env_duration_secs(ENV_IDLE_CONN_TIMEOUT)?)
                .unwrap_or(DEFAULT_IDLE_CONN_TIMEOUT),
            write_buffer_size: options
                .write_buffer_size
                .or(env_usize(ENV_WRITE_BUFFER_SIZE)?)
                .unwrap_or(DEFAULT_WRITE_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "buffer capacity must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "batch size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEndpoint {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn env_var(var: &'static str) -> Option<String> {
    env::var(var).ok().filter(|val| !val.is_empty())
}

fn env_usize(var: &'static str) -> Result<Option<usize>, ConfigError> {
    match env_var(var) {
        Some(val) => val
            .parse()
            .map(Some)
            .map_err(|source| ConfigError::InvalidValue { var, source }),
        None => Ok(None),
    }
}

fn env_duration_secs(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env_var(var) {
        Some(val) => val
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|source| ConfigError::InvalidValue { var, source }),
        None => Ok(None),
    }
}
