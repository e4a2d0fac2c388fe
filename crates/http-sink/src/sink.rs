// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The producer-facing sink handle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{SinkConfig, SinkOptions};
use crate::coordinator::BatchCoordinator;
use crate::errors::ConfigError;
use crate::shipper::Shipper;

/// Asynchronous, batching HTTP sink.
///
/// Cheap to clone; every clone writes into the same bounded intake queue.
/// The sink owns its HTTP client and background coordinator, and is torn
/// down solely by cancelling the token supplied at construction. There is no
/// explicit close or drain call.
#[derive(Clone)]
pub struct HttpSink {
    tx: mpsc::Sender<Vec<u8>>,
    cancel_token: CancellationToken,
}

impl HttpSink {
    /// Creates a sink and spawns its coordinator on the current runtime.
    ///
    /// `endpoint` overrides `HTTP_SINK_ENDPOINT` when non-empty; tunables not
    /// set in `options` fall back to the environment, then to built-in
    /// defaults. All configuration problems surface here, synchronously.
    pub fn new(
        endpoint: Option<&str>,
        options: SinkOptions,
        cancel_token: CancellationToken,
    ) -> Result<HttpSink, ConfigError> {
        let config = Arc::new(SinkConfig::resolve(endpoint, options)?);
        let shipper = Arc::new(Shipper::new(Arc::clone(&config), cancel_token.clone())?);
        let (tx, rx) = mpsc::channel(config.buffer_capacity);

        let coordinator = BatchCoordinator::new(rx, shipper, config, cancel_token.clone());
        tokio::spawn(coordinator.run());

        Ok(HttpSink { tx, cancel_token })
    }

    /// Copies `buf` and enqueues it as one record.
    ///
    /// Blocks only while the intake queue is full; cancellation unblocks any
    /// waiter, dropping the record. Always reports the full input length:
    /// delivery failures are observed through the configured error handler,
    /// never here. The caller may reuse its buffer as soon as this returns.
    pub async fn write(&self, buf: &[u8]) -> usize {
        let record = buf.to_vec();
        tokio::select! {
            _ = self.cancel_token.cancelled() => {
                debug!("Sink cancelled, dropping {} byte record", buf.len());
            }
            sent = self.tx.send(record) => {
                if sent.is_err() {
                    debug!("Record queue closed, dropping {} byte record", buf.len());
                }
            }
        }
        buf.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    #[serial]
    async fn test_write_reports_input_length() {
        let sink = HttpSink::new(
            Some("http://127.0.0.1:9/"),
            SinkOptions::default(),
            CancellationToken::new(),
        )
        .unwrap();

        let n = sink.write(br#"{"key":"value"}"#).await;
        assert_eq!(n, 15);
    }

    #[tokio::test]
    #[serial]
    async fn test_write_does_not_deadlock_after_cancellation() {
        let cancel_token = CancellationToken::new();
        let options = SinkOptions {
            buffer_capacity: Some(2),
            ..Default::default()
        };
        let sink = HttpSink::new(Some("http://127.0.0.1:9/"), options, cancel_token.clone())
            .unwrap();

        cancel_token.cancel();
        // Idempotent; a second fire has no additional effect.
        cancel_token.cancel();

        let writes = async {
            for _ in 0..50 {
                sink.write(b"{}").await;
            }
        };
        timeout(Duration::from_secs(2), writes)
            .await
            .expect("writes should never block after cancellation");
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_endpoint_fails_construction() {
        std::env::remove_var(crate::config::ENV_ENDPOINT);
        let result = HttpSink::new(None, SinkOptions::default(), CancellationToken::new());
        assert!(matches!(result, Err(ConfigError::MissingEndpoint)));
    }
}
