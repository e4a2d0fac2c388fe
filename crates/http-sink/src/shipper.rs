// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-batch transmission: payload assembly and the HTTP POST.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SinkConfig;
use crate::errors::{ConfigError, ShipError};

pub const MIME_TYPE_APPLICATION_JSON: &str = "application/json";

/// Sends batches to the configured endpoint, one POST per batch.
///
/// The `reqwest::Client` is built once at sink construction with the
/// configured pool tuning and owned exclusively by this sink instance; its
/// connection pool is shared safely across the concurrent per-batch sends.
pub struct Shipper {
    client: reqwest::Client,
    config: Arc<SinkConfig>,
    cancel_token: CancellationToken,
}

impl Shipper {
    pub(crate) fn new(
        config: Arc<SinkConfig>,
        cancel_token: CancellationToken,
    ) -> Result<Shipper, ConfigError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(Some(config.idle_conn_timeout))
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Shipper {
            client,
            config,
            cancel_token,
        })
    }

    /// Ships one non-empty batch as a single newline-delimited POST body.
    ///
    /// Best effort, at most once: 200 and 201 are success (the response body
    /// is discarded), anything else is reported through the error handler and
    /// the batch is dropped. Cancellation aborts the request promptly.
    pub async fn ship(&self, batch: Vec<Vec<u8>>) {
        debug!("Shipping batch of {} records", batch.len());
        let payload = assemble(self.config.write_buffer_size, &batch);

        let request = self
            .client
            .post(self.config.endpoint.clone())
            .header(CONTENT_TYPE, MIME_TYPE_APPLICATION_JSON)
            .body(payload);

        let response = tokio::select! {
            _ = self.cancel_token.cancelled() => {
                (self.config.error_handler)(
                    "Request aborted by shutdown",
                    Some(&ShipError::Aborted),
                );
                return;
            }
            response = request.send() => response,
        };

        match response {
            Ok(response) => {
                let status = response.status();
                if status != StatusCode::OK && status != StatusCode::CREATED {
                    let cause = ShipError::Status(status);
                    (self.config.error_handler)(&format!("HTTP error {status}"), Some(&cause));
                }
            }
            Err(e) => {
                let cause = ShipError::Transport(e);
                (self.config.error_handler)("Error sending request", Some(&cause));
            }
        }
    }
}

/// Concatenates each record followed by a single newline, in batch order.
///
/// `cap` bounds the preallocation; an oversized batch still assembles, it
/// just reallocates.
fn assemble(cap: usize, batch: &[Vec<u8>]) -> Vec<u8> {
    let exact: usize = batch.iter().map(|record| record.len() + 1).sum();
    let mut payload = Vec::with_capacity(exact.min(cap));
    for record in batch {
        payload.extend_from_slice(record);
        payload.push(b'\n');
    }
    payload
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{SinkConfig, DEFAULT_WRITE_BUFFER_SIZE};
    use crate::errors::{noop_handler, ErrorHandler};
    use proptest::prelude::*;
    use reqwest::Url;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn test_config(endpoint: &str, error_handler: ErrorHandler) -> Arc<SinkConfig> {
        Arc::new(SinkConfig {
            endpoint: Url::parse(endpoint).unwrap(),
            buffer_capacity: 16,
            batch_size: 5,
            error_handler,
            max_idle_connections: 5,
            idle_conn_timeout: Duration::from_secs(30),
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        })
    }

    fn collecting_handler() -> (ErrorHandler, Arc<Mutex<Vec<(String, Option<String>)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: ErrorHandler = Arc::new(move |label, cause| {
            sink.lock()
                .unwrap()
                .push((label.to_string(), cause.map(ToString::to_string)));
        });
        (handler, seen)
    }

    #[test]
    fn test_assemble_joins_records_with_newlines() {
        let batch = vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()];
        let payload = assemble(DEFAULT_WRITE_BUFFER_SIZE, &batch);
        assert_eq!(payload, b"one\ntwo\nthree\n");
    }

    #[test]
    fn test_assemble_with_tiny_preallocation_cap() {
        let batch = vec![vec![b'x'; 64], vec![b'y'; 64]];
        let payload = assemble(8, &batch);
        assert_eq!(payload.len(), 130);
    }

    proptest! {
        #[test]
        fn test_assemble_round_trips(
            batch in prop::collection::vec(
                prop::collection::vec(any::<u8>().prop_filter("no newline", |b| *b != b'\n'), 0..64),
                1..8,
            )
        ) {
            let payload = assemble(DEFAULT_WRITE_BUFFER_SIZE, &batch);
            prop_assert_eq!(payload.last(), Some(&b'\n'));
            let lines: Vec<&[u8]> = payload[..payload.len() - 1].split(|b| *b == b'\n').collect();
            prop_assert_eq!(lines.len(), batch.len());
            for (line, record) in lines.iter().zip(batch.iter()) {
                prop_assert_eq!(*line, record.as_slice());
            }
        }
    }

    #[tokio::test]
    async fn test_ship_success_invokes_no_handler() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("Content-Type", MIME_TYPE_APPLICATION_JSON)
            .with_status(200)
            .create_async()
            .await;

        let (handler, seen) = collecting_handler();
        let shipper = Shipper::new(
            test_config(&server.url(), handler),
            CancellationToken::new(),
        )
        .unwrap();

        shipper.ship(vec![br#"{"key":"value"}"#.to_vec()]).await;

        mock.assert_async().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ship_created_is_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(201)
            .create_async()
            .await;

        let (handler, seen) = collecting_handler();
        let shipper = Shipper::new(
            test_config(&server.url(), handler),
            CancellationToken::new(),
        )
        .unwrap();

        shipper.ship(vec![b"{}".to_vec()]).await;

        mock.assert_async().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ship_reports_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(400)
            .create_async()
            .await;

        let (handler, seen) = collecting_handler();
        let shipper = Shipper::new(
            test_config(&server.url(), handler),
            CancellationToken::new(),
        )
        .unwrap();

        shipper.ship(vec![b"{}".to_vec()]).await;

        mock.assert_async().await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("400"));
        assert_eq!(seen[0].1.as_deref(), Some("http status 400 Bad Request"));
    }

    #[tokio::test]
    async fn test_ship_reports_transport_failure() {
        // Port 1 is never listening.
        let (handler, seen) = collecting_handler();
        let shipper = Shipper::new(
            test_config("http://127.0.0.1:1/", handler),
            CancellationToken::new(),
        )
        .unwrap();

        shipper.ship(vec![b"{}".to_vec()]).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "Error sending request");
        assert!(seen[0].1.is_some());
    }

    #[tokio::test]
    async fn test_ship_aborts_on_cancellation() {
        let (handler, seen) = collecting_handler();
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();
        let shipper = Shipper::new(
            test_config("http://127.0.0.1:1/", handler),
            cancel_token,
        )
        .unwrap();

        shipper.ship(vec![b"{}".to_vec()]).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "Request aborted by shutdown");
        assert_eq!(seen[0].1.as_deref(), Some("request aborted by shutdown"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_ship_logs_batch_size() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .create_async()
            .await;

        let shipper = Shipper::new(
            test_config(&server.url(), noop_handler()),
            CancellationToken::new(),
        )
        .unwrap();

        shipper.ship(vec![b"a".to_vec(), b"b".to_vec()]).await;

        assert!(logs_contain("Shipping batch of 2 records"));
    }
}
