// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! Every tunable of the I/O engine with its default. Values can be
//! overridden from the environment (`OBJECT_IO_` prefix, e.g.
//! `OBJECT_IO_SEMAPHORE_CAP=134217728`) through [`IoConfig::from_env`];
//! embedded callers usually construct the struct directly and adjust
//! fields. [`IoConfig::validate`] runs in the engine constructor and
//! rejects impossible combinations instead of failing later mid-stream.
//!
//! Durations are stored as milliseconds for serde friendliness; the
//! `*_timeout` accessors return [`Duration`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use object_io_domain::ObjectIoError;

/// Engine configuration. Field names follow the deployment option names;
/// see each field for the governed behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Alignment of range-cache windows in bytes. Power of two.
    pub object_range_align: u64,

    /// Byte bound of the range cache (usage is buffer bytes, with a fixed
    /// overhead charge for null entries).
    pub object_range_cache_cap: u64,

    /// Parallel aligned sub-range fetches serving one user read.
    pub read_range_concurrency: usize,

    /// Process-wide cap on concurrent block reads.
    pub read_concurrency_global: usize,

    /// Per-agent cap on concurrent block reads, keyed by node id.
    pub read_concurrency_agent: usize,

    /// Process byte-admission cap shared by uploads and reads.
    pub semaphore_cap: u64,

    /// How long a stream may wait for admission before failing with
    /// `StreamItemTimeout`.
    pub stream_semaphore_timeout_ms: u64,

    /// Upper bound on the bytes one stream reserves at admission.
    pub stream_semaphore_size_cap: u64,

    /// Admission size for streams of unknown length.
    pub stream_minimal_size_lock: u64,

    /// Timeout of a single block read.
    pub read_block_timeout_ms: u64,

    /// Timeout of a single block write.
    pub write_block_timeout_ms: u64,

    /// In-flight-read gauge threshold below which the video tail prefetch
    /// is allowed.
    pub video_prefetch_load_cap: usize,

    /// Probability in [0, 1] of an injected failure per block read.
    /// Testing only; keep 0.0 in production.
    pub error_injection_on_read: f64,

    /// Codec worker pool slots (encode and decode).
    pub encode_concurrency: usize,

    /// Coalescer flush thresholds: batch length and linger time.
    pub coalesce_max_length: usize,
    pub coalesce_max_wait_ms: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            object_range_align: 64 * 1024 * 1024,
            object_range_cache_cap: 256 * 1024 * 1024,
            read_range_concurrency: 32,
            read_concurrency_global: 256,
            read_concurrency_agent: 32,
            semaphore_cap: 256 * 1024 * 1024,
            stream_semaphore_timeout_ms: 120_000,
            stream_semaphore_size_cap: 64 * 1024 * 1024,
            stream_minimal_size_lock: 1024 * 1024,
            read_block_timeout_ms: 10_000,
            write_block_timeout_ms: 10_000,
            video_prefetch_load_cap: 10,
            error_injection_on_read: 0.0,
            encode_concurrency: 20,
            coalesce_max_length: 20,
            coalesce_max_wait_ms: 10,
        }
    }
}

impl IoConfig {
    /// Loads defaults overridden by `OBJECT_IO_*` environment variables.
    pub fn from_env() -> Result<Self, ObjectIoError> {
        let loaded: IoConfig = config::Config::builder()
            .add_source(config::Environment::with_prefix("OBJECT_IO").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                ObjectIoError::InvalidConfiguration(format!("environment config: {}", e))
            })?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ObjectIoError> {
        if !self.object_range_align.is_power_of_two() {
            return Err(ObjectIoError::InvalidConfiguration(format!(
                "object_range_align {} is not a power of two",
                self.object_range_align
            )));
        }
        if self.semaphore_cap == 0 || self.semaphore_cap > u32::MAX as u64 {
            return Err(ObjectIoError::InvalidConfiguration(format!(
                "semaphore_cap {} out of range",
                self.semaphore_cap
            )));
        }
        if self.stream_minimal_size_lock == 0
            || self.stream_minimal_size_lock > self.semaphore_cap
        {
            return Err(ObjectIoError::InvalidConfiguration(
                "stream_minimal_size_lock must be positive and within semaphore_cap".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.error_injection_on_read) {
            return Err(ObjectIoError::InvalidConfiguration(format!(
                "error_injection_on_read {} outside [0, 1]",
                self.error_injection_on_read
            )));
        }
        for (name, value) in [
            ("read_range_concurrency", self.read_range_concurrency),
            ("read_concurrency_global", self.read_concurrency_global),
            ("read_concurrency_agent", self.read_concurrency_agent),
            ("encode_concurrency", self.encode_concurrency),
            ("coalesce_max_length", self.coalesce_max_length),
        ] {
            if value == 0 {
                return Err(ObjectIoError::InvalidConfiguration(format!(
                    "{} must be positive",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn stream_semaphore_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_semaphore_timeout_ms)
    }

    pub fn read_block_timeout(&self) -> Duration {
        Duration::from_millis(self.read_block_timeout_ms)
    }

    pub fn write_block_timeout(&self) -> Duration {
        Duration::from_millis(self.write_block_timeout_ms)
    }

    pub fn coalesce_max_wait(&self) -> Duration {
        Duration::from_millis(self.coalesce_max_wait_ms)
    }

    /// Bytes a stream of the given declared size reserves at admission:
    /// `min(declared, stream_semaphore_size_cap)`, at least the minimal
    /// lock, never beyond the process cap.
    pub fn admission_size(&self, declared_size: Option<u64>) -> u64 {
        declared_size
            .map(|size| size.min(self.stream_semaphore_size_cap))
            .unwrap_or(self.stream_minimal_size_lock)
            .max(self.stream_minimal_size_lock)
            .min(self.semaphore_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(IoConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_unaligned_align() {
        let config = IoConfig {
            object_range_align: 3 * 1024 * 1024,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_injection_probability() {
        let config = IoConfig {
            error_injection_on_read: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_admission_size() {
        let config = IoConfig {
            semaphore_cap: 100,
            stream_semaphore_size_cap: 50,
            stream_minimal_size_lock: 10,
            ..Default::default()
        };
        // declared within the stream cap
        assert_eq!(config.admission_size(Some(30)), 30);
        // declared above the stream cap clamps to it
        assert_eq!(config.admission_size(Some(500)), 50);
        // tiny streams still take the minimal lock
        assert_eq!(config.admission_size(Some(1)), 10);
        // unknown size takes the minimal lock
        assert_eq!(config.admission_size(None), 10);
    }
}
