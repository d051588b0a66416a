// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Aligned-Range LRU Cache
//!
//! Caches object data at aligned-window granularity. The key is
//! `(obj_id, aligned_start)` where `aligned_start = floor(start / align) *
//! align`; the value is the full `[aligned_start, aligned_start + align)`
//! buffer plus a snapshot of the object metadata taken when the buffer was
//! loaded. A `None` buffer is a negative entry: the window lies entirely
//! past the object's end.
//!
//! ## Bounds and eviction
//!
//! The cache is bounded by **total bytes**, not entry count. An entry's
//! usage is its buffer length, or a fixed 1024-byte charge for negative
//! entries. Inserting past the cap evicts least-recently-used entries
//! until usage fits again.
//!
//! ## Validation
//!
//! A cached buffer may only be served while its metadata snapshot still
//! matches the authoritative record ([`ObjectMd::same_version`]). The
//! read path performs the light metadata RPC and calls
//! [`invalidate`](RangeLruCache::invalidate) on mismatch; the cache itself
//! stays transport-free.
//!
//! ## Single-flight loads
//!
//! [`get_or_load`](RangeLruCache::get_or_load) coalesces concurrent misses
//! on one key: at most one load runs per key, with late arrivals waiting
//! on the loader's gate and then re-reading the cache.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use object_io_domain::value_objects::byte_range::ByteRange;
use object_io_domain::value_objects::ids::ObjectId;
use object_io_domain::{ObjectIoError, ObjectMd};

/// `(obj_id, aligned_start)`.
pub type RangeKey = (ObjectId, u64);

/// Usage charged for a negative (EOF) entry.
const NULL_ENTRY_USAGE: u64 = 1024;

/// One cached aligned window.
#[derive(Debug, Clone)]
pub struct CachedRange {
    /// Metadata snapshot taken when the window was loaded.
    pub object_md: ObjectMd,
    /// The aligned window's bytes, or `None` when the window starts at or
    /// past the object's end.
    pub buffer: Option<Bytes>,
}

impl CachedRange {
    fn usage(&self) -> u64 {
        self.buffer
            .as_ref()
            .map(|b| b.len() as u64)
            .unwrap_or(NULL_ENTRY_USAGE)
    }

    /// Slices the intersection of `range` with this window (whose start is
    /// `aligned_start`). `None` for an empty intersection or a negative
    /// entry.
    pub fn slice(&self, aligned_start: u64, range: &ByteRange) -> Option<Bytes> {
        let buffer = self.buffer.as_ref()?;
        let window = ByteRange::new(aligned_start, aligned_start + buffer.len() as u64).ok()?;
        let overlap = window.intersect(range)?;
        let from = (overlap.start() - aligned_start) as usize;
        let to = (overlap.end() - aligned_start) as usize;
        Some(buffer.slice(from..to))
    }
}

struct CacheState {
    lru: LruCache<RangeKey, CachedRange>,
    used_bytes: u64,
    loading: HashMap<RangeKey, Arc<tokio::sync::Mutex<()>>>,
}

/// Byte-bounded LRU over aligned object ranges.
pub struct RangeLruCache {
    align: u64,
    cap_bytes: u64,
    state: Mutex<CacheState>,
}

impl RangeLruCache {
    pub fn new(align: u64, cap_bytes: u64) -> Self {
        debug_assert!(align.is_power_of_two());
        Self {
            align,
            cap_bytes,
            state: Mutex::new(CacheState {
                lru: LruCache::unbounded(),
                used_bytes: 0,
                loading: HashMap::new(),
            }),
        }
    }

    pub fn align(&self) -> u64 {
        self.align
    }

    /// Cache key of the window containing `pos`.
    pub fn key_for(&self, obj_id: ObjectId, pos: u64) -> RangeKey {
        (obj_id, ByteRange::align_down(pos, self.align))
    }

    /// Looks up and touches an entry.
    pub fn get(&self, key: &RangeKey) -> Option<CachedRange> {
        self.state.lock().lru.get(key).cloned()
    }

    /// Inserts an entry, evicting LRU entries while over the byte cap.
    pub fn insert(&self, key: RangeKey, entry: CachedRange) {
        let mut state = self.state.lock();
        Self::insert_locked(&mut state, self.cap_bytes, key, entry);
    }

    fn insert_locked(state: &mut CacheState, cap: u64, key: RangeKey, entry: CachedRange) {
        state.used_bytes += entry.usage();
        if let Some((_, replaced)) = state.lru.push(key, entry) {
            state.used_bytes -= replaced.usage();
        }
        while state.used_bytes > cap && state.lru.len() > 1 {
            if let Some((_, evicted)) = state.lru.pop_lru() {
                state.used_bytes -= evicted.usage();
            } else {
                break;
            }
        }
    }

    /// Drops an entry (stale snapshot detected by the read path).
    pub fn invalidate(&self, key: &RangeKey) {
        let mut state = self.state.lock();
        if let Some(removed) = state.lru.pop(key) {
            state.used_bytes -= removed.usage();
        }
    }

    /// Returns the cached entry for `key`, loading it with `load` on a
    /// miss. Concurrent misses on the same key share one load.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: RangeKey,
        load: F,
    ) -> Result<CachedRange, ObjectIoError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CachedRange, ObjectIoError>>,
    {
        loop {
            let gate = {
                let mut state = self.state.lock();
                if let Some(entry) = state.lru.get(&key) {
                    return Ok(entry.clone());
                }
                Arc::clone(
                    state
                        .loading
                        .entry(key)
                        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
                )
            };

            match Arc::clone(&gate).try_lock_owned() {
                Ok(_loading_guard) => {
                    let result = load().await;
                    let mut state = self.state.lock();
                    state.loading.remove(&key);
                    return result.map(|entry| {
                        Self::insert_locked(&mut state, self.cap_bytes, key, entry.clone());
                        entry
                    });
                    // _loading_guard drops here; waiters wake and re-check
                }
                Err(_) => {
                    // someone else is loading; wait for them, then retry
                    let _wait = gate.lock().await;
                }
            }
        }
    }

    /// Entries currently cached.
    pub fn len(&self) -> usize {
        self.state.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current byte usage.
    pub fn used_bytes(&self) -> u64 {
        self.state.lock().used_bytes
    }

    /// True when an entry exists for the window containing `pos`.
    pub fn contains(&self, obj_id: ObjectId, pos: u64) -> bool {
        let key = self.key_for(obj_id, pos);
        self.state.lock().lru.contains(&key)
    }
}
