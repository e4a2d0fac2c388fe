// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single background loop that drains the intake queue into batches.
//!
//! Each cycle blocks until a first record arrives (or the lifetime signal
//! fires), then opportunistically folds in whatever has accumulated since the
//! last cycle without waiting, and hands the batch to the shipper on a
//! spawned task so the next cycle starts immediately. Batch boundaries are
//! purely queue-state-driven; there is no time-based flush interval, so a
//! lone record under low load ships immediately as a batch of one.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SinkConfig;
use crate::errors::ShipError;
use crate::shipper::Shipper;

/// One coordinator runs per sink instance, for the sink's entire lifetime.
pub struct BatchCoordinator {
    rx: mpsc::Receiver<Vec<u8>>,
    shipper: Arc<Shipper>,
    config: Arc<SinkConfig>,
    cancel_token: CancellationToken,
}

impl BatchCoordinator {
    pub(crate) fn new(
        rx: mpsc::Receiver<Vec<u8>>,
        shipper: Arc<Shipper>,
        config: Arc<SinkConfig>,
        cancel_token: CancellationToken,
    ) -> Self {
        BatchCoordinator {
            rx,
            shipper,
            config,
            cancel_token,
        }
    }

    /// Runs until the lifetime signal fires or every producer handle is gone.
    ///
    /// Dispatch is fire and forget: one task per batch, unbounded fan-out,
    /// matching the per-batch concurrency the sink promises. A sustained high
    /// dispatch rate therefore puts no cap on concurrent outbound requests.
    pub async fn run(mut self) {
        loop {
            let first = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Coordinator cancelled, shutting down");
                    return;
                }
                received = self.rx.recv() => match received {
                    Some(record) => record,
                    None => {
                        debug!("All producer handles dropped, shutting down");
                        return;
                    }
                },
            };

            let Some(batch) = self.collect_batch(first) else {
                // Cancelled mid-drain. The partial batch is intentionally
                // abandoned; cancellation is not a flush.
                debug!("Coordinator cancelled mid-drain, shutting down");
                return;
            };

            let shipper = Arc::clone(&self.shipper);
            tokio::spawn(async move {
                shipper.ship(batch).await;
            });
        }
    }

    /// Seeds a batch with `first` and drains more records without blocking,
    /// stopping at `batch_size` records or a momentarily empty queue.
    ///
    /// Returns `None` when the lifetime signal fires during the drain. A
    /// closed queue is a coordinator-local fault: reported through the error
    /// handler, then the batch built so far still ships.
    fn collect_batch(&mut self, first: Vec<u8>) -> Option<Vec<Vec<u8>>> {
        let mut batch = Vec::with_capacity(self.config.batch_size);
        batch.push(first);

        while batch.len() < self.config.batch_size {
            if self.cancel_token.is_cancelled() {
                return None;
            }
            match self.rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    (self.config.error_handler)(
                        "Error reading from record queue",
                        Some(&ShipError::QueueClosed),
                    );
                    break;
                }
            }
        }

        Some(batch)
    }
}
