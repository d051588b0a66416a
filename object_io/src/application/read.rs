// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Read Path
//!
//! Reconstructs object bytes from stored blocks, bottom-up:
//!
//! 1. Each stream pull reserves `requested_size` bytes from the admission
//!    semaphore and asks the cache layer for the window.
//! 2. The cache layer splits the window into aligned sub-ranges and
//!    fetches up to `read_range_concurrency` of them in parallel. Hits are
//!    validated against the authoritative metadata; misses load the full
//!    aligned window through the mapper (single-flight per key).
//! 3. Loading a window reads the mapped parts. Per part, the **data**
//!    fragments are fetched first; if any is unreadable the read retries
//!    with all fragments (data, parity, LRC) and the codec reconstructs.
//!    Each fragment's replica blocks are tried sequentially.
//! 4. Block reads hold the global and per-agent read semaphores and time
//!    out at `read_block_timeout`. Payloads are checked against the
//!    recorded block digest; a mismatch counts as an unreadable replica.
//!    Failures are reported asynchronously and the next replica is tried.
//!
//! ## Verification mode
//!
//! All replicas of every fragment are read and must agree; block digests
//! are recomputed client-side (mismatch raises `Tampering`); and the chunk
//! is decoded twice - once from data fragments, once through a
//! parity-assisted set - with the two plaintexts compared.
//!
//! ## Cancellation
//!
//! Dropping the returned stream drops pending buffers and releases every
//! semaphore immediately; no flag-polling is involved.

use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures::future::join_all;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use object_io_domain::entities::chunk_map::{BlockMd, ChunkInfo, FragmentMd, PartInfo};
use object_io_domain::services::chunk_codec::RecoveredFragment;
use object_io_domain::services::metadata_service::{ErrorReport, IoAction};
use object_io_domain::value_objects::byte_range::ByteRange;
use object_io_domain::value_objects::chunk_coder_config::FragmentKind;
use object_io_domain::value_objects::digest::Digest;
use object_io_domain::value_objects::ids::ObjectId;
use object_io_domain::{ObjectIoError, ObjectMd};

use super::engine::ObjectIoEngine;
use crate::infrastructure::cache::CachedRange;

/// Default bytes per stream pull.
const DEFAULT_READ_REQUEST: usize = 1024 * 1024;

/// Tail bytes speculatively fetched for video objects.
const VIDEO_TAIL_PREFETCH_LEN: u64 = 1024;
const VIDEO_TAIL_PREFETCH_DELAY: Duration = Duration::from_millis(10);
const VIDEO_PREFETCH_MIN_SIZE: u64 = 1024 * 1024;

/// Parameters of one object read.
#[derive(Debug, Clone)]
pub struct ReadParams {
    pub bucket: String,
    pub key: String,
    /// First byte to read; defaults to 0.
    pub start: Option<u64>,
    /// One past the last byte; defaults to (and is clamped to) the
    /// object's size.
    pub end: Option<u64>,
    /// Bytes per stream pull; defaults to 1 MiB.
    pub requested_size: Option<usize>,
}

impl ObjectIoEngine {
    /// Returns a stream over the requested object range. Buffers arrive in
    /// ascending offset order; the stream ends after the last byte of the
    /// clamped range, or yields the error that stopped it exactly once.
    pub fn read_object_stream(
        self: Arc<Self>,
        params: ReadParams,
    ) -> BoxStream<'static, Result<Bytes, ObjectIoError>> {
        let engine = self;
        Box::pin(try_stream! {
            let md = engine.meta.read_object_md(&params.bucket, &params.key).await?;
            let obj_end = md.size.min(params.end.unwrap_or(md.size));
            let mut pos = params.start.unwrap_or(0).min(obj_end);
            let requested_size = params
                .requested_size
                .unwrap_or(DEFAULT_READ_REQUEST)
                .max(1) as u64;

            Self::maybe_spawn_video_tail_prefetch(&engine, &md, pos);

            while pos < obj_end {
                let requested_end = obj_end.min(pos + requested_size);
                let guard = engine.acquire_stream_bytes(requested_end - pos).await?;
                let range = ByteRange::new(pos, requested_end)?;
                let buffers = engine.read_object_with_cache(&md, range).await?;
                for buffer in buffers {
                    if !buffer.is_empty() {
                        yield buffer;
                    }
                }
                drop(guard);
                pos = requested_end;
            }
        })
    }

    /// Reads a whole object into memory. Testing convenience; real callers
    /// stream.
    pub async fn read_entire_object(
        self: Arc<Self>,
        bucket: &str,
        key: &str,
    ) -> Result<Vec<u8>, ObjectIoError> {
        let mut stream = self.read_object_stream(ReadParams {
            bucket: bucket.to_string(),
            key: key.to_string(),
            start: None,
            end: None,
            requested_size: None,
        });
        let mut out = Vec::new();
        while let Some(buffer) = stream.next().await {
            out.extend_from_slice(&buffer?);
        }
        Ok(out)
    }

    /// Serves `[range)` through the aligned-range cache, dispatching up to
    /// `read_range_concurrency` window fetches in parallel. Returned
    /// buffers are in ascending offset order and cover the range exactly.
    pub(crate) async fn read_object_with_cache(
        &self,
        md: &ObjectMd,
        range: ByteRange,
    ) -> Result<Vec<Bytes>, ObjectIoError> {
        let windows = range.aligned_windows(self.config.object_range_align);
        let fetched: Vec<Result<(u64, CachedRange), ObjectIoError>> =
            futures::stream::iter(
                windows
                    .into_iter()
                    .map(|window| self.fetch_window(md, window)),
            )
            .buffered(self.config.read_range_concurrency)
            .collect()
            .await;

        let mut buffers = Vec::new();
        let mut covered = 0u64;
        for result in fetched {
            let (aligned_start, entry) = result?;
            if let Some(slice) = entry.slice(aligned_start, &range) {
                covered += slice.len() as u64;
                buffers.push(slice);
            }
        }

        if covered != range.len() {
            return Err(ObjectIoError::integrity(format!(
                "assembled {} bytes for range {} of object {} (size {})",
                covered, range, md.obj_id, md.size
            )));
        }
        Ok(buffers)
    }

    /// One aligned window through the cache: validated hit, invalidation
    /// on version mismatch, single-flight load on miss.
    async fn fetch_window(
        &self,
        md: &ObjectMd,
        window: ByteRange,
    ) -> Result<(u64, CachedRange), ObjectIoError> {
        let key = self.range_cache.key_for(md.obj_id, window.start());
        if let Some(entry) = self.range_cache.get(&key) {
            // a hit is served only while its snapshot matches the
            // authoritative metadata
            let current = self.meta.read_object_md(&md.bucket, &md.key).await?;
            if entry.object_md.same_version(&current) {
                self.metrics.cache_hit();
                return Ok((window.start(), entry));
            }
            debug!(obj = %md.obj_id, window = %window, "stale range entry invalidated");
            self.range_cache.invalidate(&key);
        }
        self.metrics.cache_miss();
        let entry = self
            .range_cache
            .get_or_load(key, || self.load_aligned_window(md, window))
            .await?;
        Ok((window.start(), entry))
    }

    /// Loads one full aligned window from the mapper and block stores.
    async fn load_aligned_window(
        &self,
        md: &ObjectMd,
        window: ByteRange,
    ) -> Result<CachedRange, ObjectIoError> {
        if window.start() >= md.size {
            // negative entry: the window lies past EOF
            return Ok(CachedRange {
                object_md: md.clone(),
                buffer: None,
            });
        }
        let clamped = ByteRange::new(window.start(), window.end().min(md.size))?;
        let parts = self.meta.read_object_mappings(md.obj_id, clamped).await?;
        let buffer = self.assemble_parts(md, parts, clamped).await?;
        Ok(CachedRange {
            object_md: md.clone(),
            buffer: Some(buffer),
        })
    }

    /// Materializes `[range)` from the mapped parts. Fails when any
    /// requested byte is unmapped or the assembled length disagrees.
    async fn assemble_parts(
        &self,
        md: &ObjectMd,
        mut parts: Vec<PartInfo>,
        range: ByteRange,
    ) -> Result<Bytes, ObjectIoError> {
        parts.sort_by_key(|info| info.part.start);
        let mut assembled = BytesMut::with_capacity(range.len() as usize);
        let mut cursor = range.start();

        for info in &parts {
            let part_range = ByteRange::new(info.part.start, info.part.end)?;
            let overlap = match part_range.intersect(&range) {
                Some(overlap) => overlap,
                None => continue,
            };
            if overlap.start() != cursor {
                return Err(ObjectIoError::integrity(format!(
                    "object {} range {}: bytes [{}..{}) unmapped",
                    md.obj_id,
                    range,
                    cursor,
                    overlap.start()
                )));
            }

            let plaintext = self.read_part_chunk(md.obj_id, info).await?;
            let from =
                (info.part.chunk_offset + (overlap.start() - info.part.start)) as usize;
            let to = from + overlap.len() as usize;
            if to > plaintext.len() {
                return Err(ObjectIoError::integrity(format!(
                    "object {} part {}: chunk window [{}..{}) exceeds {} decoded bytes",
                    md.obj_id,
                    info.part.part_id,
                    from,
                    to,
                    plaintext.len()
                )));
            }
            assembled.extend_from_slice(&plaintext[from..to]);
            cursor = overlap.end();
        }

        if cursor != range.end() || assembled.len() as u64 != range.len() {
            return Err(ObjectIoError::integrity(format!(
                "object {} range {}: assembled {} bytes, covered to {}",
                md.obj_id,
                range,
                assembled.len(),
                cursor
            )));
        }
        Ok(assembled.freeze())
    }

    /// Decodes one part's chunk to plaintext.
    async fn read_part_chunk(
        &self,
        obj_id: ObjectId,
        info: &PartInfo,
    ) -> Result<Vec<u8>, ObjectIoError> {
        let chunk = &info.chunk;
        let part_range = ByteRange::new(info.part.start, info.part.end)?;
        if self.verification_mode() {
            return self.verified_read_chunk(obj_id, part_range, chunk).await;
        }

        // fast path: data fragments only
        let data_frags: Vec<&FragmentMd> = chunk.frags_of_kind(FragmentKind::Data).collect();
        let results = join_all(
            data_frags
                .iter()
                .map(|frag| self.read_fragment(obj_id, part_range, frag)),
        )
        .await;

        let mut recovered = Vec::with_capacity(results.len());
        let mut complete = results.len() == chunk.coder.data_frags as usize;
        for result in results {
            match result {
                Ok(frag) => recovered.push(frag),
                Err(error) => {
                    warn!(%obj_id, chunk = %chunk.chunk_id, %error,
                          "data fragment unreadable, retrying with all fragments");
                    complete = false;
                }
            }
        }

        if !complete {
            // slow path: every fragment of every kind, fresh
            let all = join_all(
                chunk
                    .frags
                    .iter()
                    .map(|frag| self.read_fragment(obj_id, part_range, frag)),
            )
            .await;
            recovered = all.into_iter().flatten().collect();
        }

        self.codec_pool.decode(chunk.clone(), recovered).await
    }

    /// Verification-mode chunk read: all replicas, digest and payload
    /// equality, and a parity-assisted decode cross-check.
    async fn verified_read_chunk(
        &self,
        obj_id: ObjectId,
        part_range: ByteRange,
        chunk: &ChunkInfo,
    ) -> Result<Vec<u8>, ObjectIoError> {
        let mut recovered = Vec::with_capacity(chunk.frags.len());
        for frag in &chunk.frags {
            let mut payloads = Vec::with_capacity(frag.blocks.len());
            for block in &frag.blocks {
                payloads.push(
                    self.read_block_guarded(obj_id, part_range, block).await?,
                );
            }
            let first = payloads.first().ok_or_else(|| {
                ObjectIoError::Reconstruction(format!(
                    "chunk {} fragment ({:?}, {}) has no replica blocks",
                    chunk.chunk_id, frag.kind, frag.index
                ))
            })?;
            if payloads.iter().any(|p| p != first) {
                return Err(ObjectIoError::Tampering(format!(
                    "chunk {} fragment ({:?}, {}): replica payloads disagree",
                    chunk.chunk_id, frag.kind, frag.index
                )));
            }
            recovered.push(RecoveredFragment {
                kind: frag.kind,
                index: frag.index,
                frame: first.clone(),
            });
        }

        let data_only: Vec<RecoveredFragment> = recovered
            .iter()
            .filter(|f| f.kind == FragmentKind::Data)
            .cloned()
            .collect();
        let plaintext = self.codec_pool.decode(chunk.clone(), data_only).await?;

        // cross-check: decode again with one data fragment withheld so a
        // parity/LRC fragment participates
        if recovered.iter().any(|f| f.kind != FragmentKind::Data) {
            let parity_set: Vec<RecoveredFragment> = recovered
                .iter()
                .filter(|f| !(f.kind == FragmentKind::Data && f.index == 0))
                .cloned()
                .collect();
            let parity_plaintext = self.codec_pool.decode(chunk.clone(), parity_set).await?;
            if parity_plaintext != plaintext {
                return Err(ObjectIoError::integrity(format!(
                    "chunk {}: parity decode disagrees with data decode",
                    chunk.chunk_id
                )));
            }
        }
        Ok(plaintext)
    }

    /// Reads one fragment, trying its replica blocks in order.
    async fn read_fragment(
        &self,
        obj_id: ObjectId,
        part_range: ByteRange,
        frag: &FragmentMd,
    ) -> Result<RecoveredFragment, ObjectIoError> {
        let mut last_error = ObjectIoError::Reconstruction(format!(
            "fragment ({:?}, {}) has no replica blocks",
            frag.kind, frag.index
        ));
        for block in &frag.blocks {
            match self.read_block_guarded(obj_id, part_range, block).await {
                Ok(frame) => {
                    return Ok(RecoveredFragment {
                        kind: frag.kind,
                        index: frag.index,
                        frame,
                    })
                }
                Err(error) => {
                    debug!(block = %block.block_id, node = %block.node_id, %error,
                           "replica read failed, advancing to next replica");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    /// One guarded block read: global and per-agent semaphores, timeout,
    /// optional fault injection, verification-mode digest check, and
    /// asynchronous failure reporting.
    async fn read_block_guarded(
        &self,
        obj_id: ObjectId,
        part_range: ByteRange,
        block: &BlockMd,
    ) -> Result<Bytes, ObjectIoError> {
        let wait_start = Instant::now();
        let _global = Arc::clone(&self.read_global)
            .acquire_owned()
            .await
            .map_err(|_| ObjectIoError::internal("read semaphore closed"))?;
        let _agent = self.read_per_agent.acquire(&block.node_id).await?;
        self.metrics.record_read_wait(wait_start.elapsed());

        self.metrics.read_started();
        let outcome = self.read_block_inner(block).await;
        self.metrics.read_finished(outcome.is_ok());

        match outcome {
            Ok(frame) => Ok(frame),
            Err(error) => {
                self.spawn_read_error_report(obj_id, part_range, block.clone(), &error);
                Err(error)
            }
        }
    }

    async fn read_block_inner(&self, block: &BlockMd) -> Result<Bytes, ObjectIoError> {
        let injection = self.config.error_injection_on_read;
        if injection > 0.0 && rand::random::<f64>() < injection {
            return Err(ObjectIoError::BlockReadFailed(format!(
                "injected read failure for block {}",
                block.block_id
            )));
        }

        let frame = tokio::time::timeout(
            self.config.read_block_timeout(),
            self.blocks.read_block(block),
        )
        .await
        .map_err(|_| {
            ObjectIoError::TimeoutError(format!(
                "reading block {} from {}",
                block.block_id, block.node_id
            ))
        })??;

        if let Some(expected) = &block.digest {
            let actual = Digest::compute(expected.kind(), &frame);
            if &actual != expected {
                // verification mode surfaces the mismatch loudly; a normal
                // read treats the replica as unreadable and falls back
                return Err(if self.verification_mode() {
                    ObjectIoError::Tampering(format!(
                        "block {} on {}: digest {} != stored {}",
                        block.block_id, block.node_id, actual, expected
                    ))
                } else {
                    ObjectIoError::BlockReadFailed(format!(
                        "block {} on {}: digest mismatch",
                        block.block_id, block.node_id
                    ))
                });
            }
        }
        Ok(frame)
    }

    /// Fire-and-forget failure report; its own failure is swallowed.
    fn spawn_read_error_report(
        &self,
        obj_id: ObjectId,
        part_range: ByteRange,
        block: BlockMd,
        error: &ObjectIoError,
    ) {
        let meta = Arc::clone(&self.meta);
        let message = error.to_string();
        tokio::spawn(async move {
            let report = ErrorReport {
                action: IoAction::Read,
                obj_id,
                range: Some(part_range),
                block: Some(block),
                rpc_code: None,
                message,
            };
            if let Err(report_error) = meta.report_error_on_object(report).await {
                debug!(%report_error, "error report swallowed");
            }
        });
    }

    /// Speculative fetch of a video object's tail (player index probes).
    /// Runs only for reads starting at offset zero on sufficiently large
    /// `video/*` objects while the read gauge is below the configured cap.
    fn maybe_spawn_video_tail_prefetch(engine: &Arc<Self>, md: &ObjectMd, start_pos: u64) {
        if start_pos != 0
            || md.size <= VIDEO_PREFETCH_MIN_SIZE
            || !md.content_type.starts_with("video")
            || engine.metrics.current_read_load() >= engine.config.video_prefetch_load_cap
        {
            return;
        }
        let engine = Arc::clone(engine);
        let md = md.clone();
        tokio::spawn(async move {
            tokio::time::sleep(VIDEO_TAIL_PREFETCH_DELAY).await;
            let start = md.size.saturating_sub(VIDEO_TAIL_PREFETCH_LEN);
            let range = match ByteRange::new(start, md.size) {
                Ok(range) => range,
                Err(_) => return,
            };
            if let Err(error) = engine.read_object_with_cache(&md, range).await {
                debug!(obj = %md.obj_id, %error, "video tail prefetch failed");
            }
        });
    }
}
