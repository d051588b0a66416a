// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Concurrency Metrics
//!
//! Atomics-based gauges and counters for observing engine saturation.
//!
//! **Gauges** are instant values (block reads in flight right now);
//! **counters** are cumulative (total block reads, total semaphore wait).
//! All updates use `Ordering::Relaxed` - each value is an independent
//! monitor, not a synchronization point.
//!
//! The in-flight-read gauge doubles as the load signal for the video tail
//! prefetch: prefetching is allowed only while the gauge sits below the
//! configured cap.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Engine-wide concurrency gauges and counters. One instance per engine;
/// shared by `Arc`.
#[derive(Debug, Default)]
pub struct ConcurrencyMetrics {
    /// Block reads currently in flight (gauge).
    reads_in_flight: AtomicUsize,

    /// Cumulative block reads / writes / read failures.
    blocks_read: AtomicU64,
    blocks_written: AtomicU64,
    block_read_failures: AtomicU64,

    /// Total time spent waiting on the read semaphores, in milliseconds.
    read_wait_total_ms: AtomicU64,

    /// Range cache hits and misses.
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl ConcurrencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a block read started; pair with [`read_finished`](Self::read_finished).
    pub fn read_started(&self) {
        self.reads_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read_finished(&self, ok: bool) {
        self.reads_in_flight.fetch_sub(1, Ordering::Relaxed);
        if ok {
            self.blocks_read.fetch_add(1, Ordering::Relaxed);
        } else {
            self.block_read_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn block_written(&self) {
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_wait(&self, wait: Duration) {
        self.read_wait_total_ms
            .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Current read load - the video-prefetch admission signal.
    pub fn current_read_load(&self) -> usize {
        self.reads_in_flight.load(Ordering::Relaxed)
    }

    pub fn blocks_read_total(&self) -> u64 {
        self.blocks_read.load(Ordering::Relaxed)
    }

    pub fn blocks_written_total(&self) -> u64 {
        self.blocks_written.load(Ordering::Relaxed)
    }

    pub fn block_read_failures_total(&self) -> u64 {
        self.block_read_failures.load(Ordering::Relaxed)
    }

    pub fn read_wait_total(&self) -> Duration {
        Duration::from_millis(self.read_wait_total_ms.load(Ordering::Relaxed))
    }

    pub fn cache_hits_total(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses_total(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }
}
