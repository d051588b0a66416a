// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Concurrency Governors
//!
//! Semaphore-based resource governance. Three governors cap the engine:
//!
//! | Governor | Units | Purpose |
//! |---|---|---|
//! | [`ByteSemaphore`] | bytes | caps in-flight upload + read memory |
//! | global read semaphore | slots | caps concurrent block reads (plain `tokio::sync::Semaphore`) |
//! | [`KeyedSemaphore`] | slots per node | prevents single-agent saturation |
//!
//! Semaphores are the sole memory-admission mechanism; there are no
//! unbounded queues behind them. Permits are RAII guards - dropping a
//! guard releases the resource, which is what makes cancellation safe:
//! dropping a stream mid-read releases its admission immediately.
//!
//! [`StressReporter`] throttles the out-of-band "stress" report emitted on
//! admission timeouts to at most one per hour.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use object_io_domain::value_objects::ids::NodeId;
use object_io_domain::ObjectIoError;

/// A byte-denominated admission semaphore with an acquisition timeout.
///
/// One permit is one byte. Acquisitions above the configured cap are
/// impossible by construction - callers clamp with
/// [`IoConfig::admission_size`](crate::infrastructure::config::IoConfig::admission_size)
/// before acquiring.
#[derive(Debug)]
pub struct ByteSemaphore {
    inner: Arc<Semaphore>,
    cap: u64,
}

/// RAII admission guard; dropping it returns the bytes.
#[derive(Debug)]
pub struct ByteGuard {
    _permit: OwnedSemaphorePermit,
    bytes: u64,
}

impl ByteGuard {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl ByteSemaphore {
    pub fn new(cap_bytes: u64) -> Self {
        debug_assert!(cap_bytes <= u32::MAX as u64);
        Self {
            inner: Arc::new(Semaphore::new(cap_bytes as usize)),
            cap: cap_bytes,
        }
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    /// Bytes currently available for admission.
    pub fn available(&self) -> u64 {
        self.inner.available_permits() as u64
    }

    /// Reserves `bytes` within `timeout`. Fails with `StreamItemTimeout`
    /// when the deadline passes first; the caller decides whether to emit
    /// a stress report.
    pub async fn acquire(
        &self,
        bytes: u64,
        timeout: Duration,
    ) -> Result<ByteGuard, ObjectIoError> {
        let bytes = bytes.min(self.cap);
        let acquired = tokio::time::timeout(
            timeout,
            Arc::clone(&self.inner).acquire_many_owned(bytes as u32),
        )
        .await;
        match acquired {
            Ok(Ok(permit)) => Ok(ByteGuard {
                _permit: permit,
                bytes,
            }),
            Ok(Err(_)) => Err(ObjectIoError::internal("admission semaphore closed")),
            Err(_) => Err(ObjectIoError::StreamItemTimeout(format!(
                "could not reserve {} bytes within {:?} (cap {})",
                bytes, timeout, self.cap
            ))),
        }
    }
}

/// Per-key slot semaphores, lazily created. Keys are agent node ids; the
/// map only ever grows, bounded by cluster membership.
#[derive(Debug)]
pub struct KeyedSemaphore {
    slots_per_key: usize,
    inner: Mutex<HashMap<NodeId, Arc<Semaphore>>>,
}

impl KeyedSemaphore {
    pub fn new(slots_per_key: usize) -> Self {
        Self {
            slots_per_key,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires one slot for `key`, waiting while the agent is saturated.
    pub async fn acquire(&self, key: &NodeId) -> Result<OwnedSemaphorePermit, ObjectIoError> {
        let semaphore = {
            let mut map = self.inner.lock();
            Arc::clone(
                map.entry(key.clone())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.slots_per_key))),
            )
        };
        semaphore
            .acquire_owned()
            .await
            .map_err(|_| ObjectIoError::internal("per-agent semaphore closed"))
    }

    /// Slots currently free for `key` (full allotment for unseen keys).
    pub fn available(&self, key: &NodeId) -> usize {
        self.inner
            .lock()
            .get(key)
            .map(|s| s.available_permits())
            .unwrap_or(self.slots_per_key)
    }
}

/// Hourly throttle for the admission-stress report.
#[derive(Debug, Default)]
pub struct StressReporter {
    last_report: Mutex<Option<Instant>>,
}

const STRESS_REPORT_INTERVAL: Duration = Duration::from_secs(3600);

impl StressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True at most once per hour; the caller emits the report.
    pub fn should_report(&self) -> bool {
        let mut last = self.last_report.lock();
        match *last {
            Some(at) if at.elapsed() < STRESS_REPORT_INTERVAL => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_byte_semaphore_admission_and_release() {
        let semaphore = ByteSemaphore::new(100);
        assert_eq!(semaphore.available(), 100);

        let guard = semaphore
            .acquire(60, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(guard.bytes(), 60);
        assert_eq!(semaphore.available(), 40);

        drop(guard);
        assert_eq!(semaphore.available(), 100);
    }

    #[tokio::test]
    async fn test_byte_semaphore_times_out_when_exhausted() {
        let semaphore = ByteSemaphore::new(100);
        let _held = semaphore
            .acquire(100, Duration::from_millis(100))
            .await
            .unwrap();

        let result = semaphore.acquire(1, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ObjectIoError::StreamItemTimeout(_))));
    }

    #[tokio::test]
    async fn test_byte_semaphore_clamps_oversized_requests() {
        let semaphore = ByteSemaphore::new(100);
        // a request beyond the cap is admitted at the cap instead of
        // deadlocking forever
        let guard = semaphore
            .acquire(1000, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(guard.bytes(), 100);
    }

    #[tokio::test]
    async fn test_keyed_semaphore_isolates_agents() {
        let keyed = KeyedSemaphore::new(2);
        let node_a = NodeId::new("a");
        let node_b = NodeId::new("b");

        let _a1 = keyed.acquire(&node_a).await.unwrap();
        let _a2 = keyed.acquire(&node_a).await.unwrap();
        assert_eq!(keyed.available(&node_a), 0);

        // agent b is unaffected by a's saturation
        assert_eq!(keyed.available(&node_b), 2);
        let _b1 = keyed.acquire(&node_b).await.unwrap();
        assert_eq!(keyed.available(&node_b), 1);
    }

    #[test]
    fn test_stress_reporter_throttles() {
        let reporter = StressReporter::new();
        assert!(reporter.should_report());
        assert!(!reporter.should_report());
        assert!(!reporter.should_report());
    }
}
