// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Facade
//!
//! [`ObjectIoEngine`] owns every shared resource of the I/O engine - the
//! configuration, the admission and read semaphores, the range cache, the
//! codec pool, the metrics, and the two service ports - and exposes the
//! public API:
//!
//! - `upload_object` / `upload_multipart` (see [`super::upload`])
//! - `read_object_stream` / `read_entire_object` (see [`super::read`])
//! - `set_verification_mode` / `clear_verification_mode`
//!
//! All governors and caches are instance-scoped: two engines in one
//! process (as in tests) share nothing. Wrap the engine in an `Arc`; the
//! streaming methods take `self: &Arc<Self>` so returned streams can
//! outlive the borrow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use object_io_domain::services::metadata_service::EndpointProblemReport;
use object_io_domain::{BlockStore, ChunkCodec, MetadataService, ObjectIoError};

use crate::infrastructure::cache::RangeLruCache;
use crate::infrastructure::config::IoConfig;
use crate::infrastructure::metrics::ConcurrencyMetrics;
use crate::infrastructure::runtime::semaphores::ByteGuard;
use crate::infrastructure::runtime::{ByteSemaphore, CodecPool, KeyedSemaphore, StressReporter};

/// The client-side object I/O engine.
pub struct ObjectIoEngine {
    pub(crate) config: IoConfig,
    pub(crate) meta: Arc<dyn MetadataService>,
    pub(crate) blocks: Arc<dyn BlockStore>,
    pub(crate) codec_pool: Arc<CodecPool>,
    pub(crate) stream_semaphore: Arc<ByteSemaphore>,
    pub(crate) read_global: Arc<Semaphore>,
    pub(crate) read_per_agent: Arc<KeyedSemaphore>,
    pub(crate) range_cache: Arc<RangeLruCache>,
    pub(crate) metrics: Arc<ConcurrencyMetrics>,
    pub(crate) stress: StressReporter,
    verification: AtomicBool,
}

impl ObjectIoEngine {
    /// Builds an engine over the given service ports and codec. Validates
    /// the configuration up front.
    pub fn new(
        config: IoConfig,
        meta: Arc<dyn MetadataService>,
        blocks: Arc<dyn BlockStore>,
        codec: Arc<dyn ChunkCodec>,
    ) -> Result<Self, ObjectIoError> {
        config.validate()?;
        Ok(Self {
            stream_semaphore: Arc::new(ByteSemaphore::new(config.semaphore_cap)),
            read_global: Arc::new(Semaphore::new(config.read_concurrency_global)),
            read_per_agent: Arc::new(KeyedSemaphore::new(config.read_concurrency_agent)),
            range_cache: Arc::new(RangeLruCache::new(
                config.object_range_align,
                config.object_range_cache_cap,
            )),
            codec_pool: Arc::new(CodecPool::new(codec, config.encode_concurrency)),
            metrics: Arc::new(ConcurrencyMetrics::new()),
            stress: StressReporter::new(),
            verification: AtomicBool::new(false),
            config,
            meta,
            blocks,
        })
    }

    /// Verification mode reads all replicas, checks digests client-side,
    /// and round-trips decoding through parity fragments. Diagnostic use.
    pub fn set_verification_mode(&self) {
        self.verification.store(true, Ordering::Relaxed);
    }

    pub fn clear_verification_mode(&self) {
        self.verification.store(false, Ordering::Relaxed);
    }

    pub fn verification_mode(&self) -> bool {
        self.verification.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ConcurrencyMetrics {
        &self.metrics
    }

    /// The range cache (exposed for diagnostics and tests).
    pub fn range_cache(&self) -> &RangeLruCache {
        &self.range_cache
    }

    /// The byte-admission semaphore (exposed for diagnostics and tests).
    pub fn stream_semaphore(&self) -> &ByteSemaphore {
        &self.stream_semaphore
    }

    /// Reserves stream memory, emitting the throttled stress report when
    /// admission times out. The report RPC is fire-and-forget; its own
    /// failure never replaces the timeout error.
    pub(crate) async fn acquire_stream_bytes(
        &self,
        bytes: u64,
    ) -> Result<ByteGuard, ObjectIoError> {
        let result = self
            .stream_semaphore
            .acquire(bytes, self.config.stream_semaphore_timeout())
            .await;
        if let Err(ObjectIoError::StreamItemTimeout(message)) = &result {
            if self.stress.should_report() {
                let meta = Arc::clone(&self.meta);
                let report = EndpointProblemReport {
                    message: format!("stream admission stressed: {}", message),
                };
                tokio::spawn(async move {
                    if let Err(report_error) = meta.report_endpoint_problems(report).await {
                        debug!(%report_error, "stress report swallowed");
                    }
                });
            }
        }
        result
    }
}
