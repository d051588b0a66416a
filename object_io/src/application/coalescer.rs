// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Coalescer Stage
//!
//! Batches items flowing between two bounded channels: a batch flushes
//! when it reaches `max_length` items or `max_wait` after its first item,
//! whichever fires first. Ordering is preserved, and any residue flushes
//! when the upstream closes. The upload pipeline uses this to amortize one
//! mapper round trip across many chunks.

use std::mem;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use object_io_domain::ObjectIoError;

async fn flush<T>(
    tx: &mpsc::Sender<Vec<T>>,
    batch: &mut Vec<T>,
) -> Result<(), ObjectIoError> {
    if batch.is_empty() {
        return Ok(());
    }
    tx.send(mem::take(batch))
        .await
        .map_err(|_| ObjectIoError::cancelled())
}

/// Runs the coalescer until the upstream channel closes.
///
/// The linger timer starts when a batch's **first** item arrives; later
/// items do not extend it. While a full batch waits for downstream
/// capacity, upstream items queue in the bounded input channel - that is
/// the backpressure path, not a timer concern.
pub async fn coalesce<T: Send>(
    mut rx: mpsc::Receiver<T>,
    tx: mpsc::Sender<Vec<T>>,
    max_length: usize,
    max_wait: Duration,
) -> Result<(), ObjectIoError> {
    let mut batch: Vec<T> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let item = match deadline {
            Some(at) => match tokio::time::timeout_at(at, rx.recv()).await {
                Ok(item) => item,
                Err(_) => {
                    flush(&tx, &mut batch).await?;
                    deadline = None;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match item {
            Some(value) => {
                if batch.is_empty() {
                    deadline = Some(Instant::now() + max_wait);
                }
                batch.push(value);
                if batch.len() >= max_length {
                    flush(&tx, &mut batch).await?;
                    deadline = None;
                }
            }
            None => {
                flush(&tx, &mut batch).await?;
                return Ok(());
            }
        }
    }
}
