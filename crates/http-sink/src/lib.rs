// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous, batching HTTP sink for opaque byte records.
//!
//! Producers hand the sink byte records (typically single JSON log lines)
//! through [`HttpSink::write`]. Records land in a bounded intake queue; a
//! single background coordinator drains the queue into batches and ships each
//! batch concurrently as one newline-delimited HTTP POST body. The producer
//! never blocks on network I/O, only on a full queue (backpressure).
//!
//! Delivery is best effort. Nothing is retried, nothing is persisted, and
//! failures are observed exclusively through the configured error callback.
//! The whole pipeline is torn down by cancelling the shared
//! [`CancellationToken`](tokio_util::sync::CancellationToken) supplied at
//! construction; records still queued or in flight at that point may be lost.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod shipper;
pub mod sink;

pub use config::{SinkConfig, SinkOptions};
pub use errors::{ConfigError, ErrorHandler, ShipError};
pub use sink::HttpSink;
