// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relays newline-delimited records from stdin to an HTTP endpoint.
//!
//! The endpoint comes from the first command-line argument or
//! `HTTP_SINK_ENDPOINT`; every other tunable comes from the `HTTP_SINK_*`
//! environment variables. Ctrl-C cancels the shared lifetime token, which
//! tears the sink down without draining.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use http_sink::{ErrorHandler, HttpSink, SinkOptions};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("HTTP_SINK_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let endpoint = env::args().nth(1);
    let error_handler: ErrorHandler = Arc::new(|label, cause| match cause {
        Some(cause) => error!("{label}: {cause}"),
        None => error!("{label}"),
    });
    let options = SinkOptions {
        error_handler: Some(error_handler),
        ..Default::default()
    };

    let cancel_token = CancellationToken::new();
    let sink = match HttpSink::new(endpoint.as_deref(), options, cancel_token.clone()) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Invalid sink configuration: {e}");
            return;
        }
    };

    {
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                cancel_token.cancel();
            }
        });
    }

    debug!("Relaying stdin to the configured endpoint");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    sink.write(line.as_bytes()).await;
                }
                Ok(None) => {
                    debug!("stdin closed, exiting");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {e}");
                    break;
                }
            },
        }
    }
}
