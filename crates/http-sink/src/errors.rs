// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use std::sync::Arc;

/// Callback observing asynchronous delivery failures.
///
/// Invoked with a descriptive label and, when one exists, the underlying
/// failure. Producers never see delivery errors through
/// [`HttpSink::write`](crate::sink::HttpSink::write); this callback is the
/// only channel. The default handler discards everything.
pub type ErrorHandler = Arc<dyn Fn(&str, Option<&ShipError>) + Send + Sync>;

pub(crate) fn noop_handler() -> ErrorHandler {
    Arc::new(|_, _| {})
}

/// Errors that prevent sink construction.
///
/// All configuration problems surface synchronously from
/// [`HttpSink::new`](crate::sink::HttpSink::new); a constructed sink never
/// re-validates its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid endpoint url {value:?}: {reason}")]
    InvalidEndpoint { value: String, reason: String },

    #[error("invalid value for {var}: {source}")]
    InvalidValue {
        var: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no endpoint configured")]
    MissingEndpoint,

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Delivery failures reported through the [`ErrorHandler`].
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    /// Connection failure, timeout, or any other transport-level error.
    #[error("error sending request: {0}")]
    Transport(#[from] reqwest::Error),

    /// The destination answered with a status other than 200 or 201.
    #[error("http status {0}")]
    Status(StatusCode),

    /// The request was abandoned because the lifetime signal fired.
    #[error("request aborted by shutdown")]
    Aborted,

    /// The intake queue closed underneath the coordinator.
    #[error("record queue closed unexpectedly")]
    QueueClosed,
}
