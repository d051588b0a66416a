// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Map Client
//!
//! Per-batch state machine coordinating the metadata service and block
//! writes for one coalesced batch of encoded chunks:
//!
//! ```text
//! INIT -> ALLOCATE -> WRITE -> FINALIZE -> DONE (or FAILED)
//! ```
//!
//! - **ALLOCATE** submits content and fragment digests; the mapper answers
//!   a dedup reference or block targets per chunk. Duplicates skip the
//!   write phase entirely.
//! - **WRITE** pushes every (fragment, block) pair to its agent
//!   concurrently. Individual replica failures are reported asynchronously
//!   and tolerated; the mapper decides at finalize time whether the
//!   durability floor was met.
//! - **FINALIZE** commits part placements and reports which blocks were
//!   written. A `had_errors` answer fails the batch (`UploadMap`).
//!
//! The client is reentrant: it holds no per-batch mutable state, so
//! concurrent batches (and re-reads during inline verification) share one
//! instance behind an `Arc`.

use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use object_io_domain::entities::chunk_map::{BlockMd, ChunkInfo, FragmentMd, PartMd};
use object_io_domain::services::chunk_codec::EncodedChunk;
use object_io_domain::services::metadata_service::{
    AllocationDecision, ChunkAllocationRequest, ChunkWriteReport, ErrorReport,
    FinalizePartsParams, FragmentAllocation, IoAction, MetadataService,
};
use object_io_domain::value_objects::byte_range::ByteRange;
use object_io_domain::value_objects::chunk_coder_config::ChunkCoderConfig;
use object_io_domain::value_objects::ids::{BlockId, MultipartId, ObjectId, PartId};
use object_io_domain::{BlockStore, ObjectIoError};

use crate::infrastructure::metrics::ConcurrencyMetrics;

/// One encoded chunk with its placement within the stream.
pub struct BatchItem {
    pub seq: u64,
    pub start: u64,
    pub end: u64,
    pub encoded: EncodedChunk,
}

/// Allocate / write / finalize coordinator for coalesced batches.
pub struct MapUploadClient {
    meta: Arc<dyn MetadataService>,
    blocks: Arc<dyn BlockStore>,
    metrics: Arc<ConcurrencyMetrics>,
    coder_config: ChunkCoderConfig,
    write_timeout: Duration,
}

impl MapUploadClient {
    pub fn new(
        meta: Arc<dyn MetadataService>,
        blocks: Arc<dyn BlockStore>,
        metrics: Arc<ConcurrencyMetrics>,
        coder_config: ChunkCoderConfig,
        write_timeout: Duration,
    ) -> Self {
        Self {
            meta,
            blocks,
            metrics,
            coder_config,
            write_timeout,
        }
    }

    /// Runs one batch through the full state machine.
    pub async fn upload_batch(
        &self,
        obj_id: ObjectId,
        multipart_id: Option<MultipartId>,
        batch: Vec<BatchItem>,
    ) -> Result<(), ObjectIoError> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!(batch_len = batch.len(), %obj_id, "map batch: allocate");

        let requests: Vec<ChunkAllocationRequest> = batch
            .iter()
            .map(|item| ChunkAllocationRequest {
                size: item.encoded.size,
                compressed_size: item.encoded.compressed_size,
                content_digest: item.encoded.content_digest.clone(),
                frag_digests: item
                    .encoded
                    .frags
                    .iter()
                    .map(|f| (f.kind, f.index, f.digest.clone()))
                    .collect(),
            })
            .collect();

        let decisions = self.meta.allocate_chunks(obj_id, requests).await?;
        if decisions.len() != batch.len() {
            return Err(ObjectIoError::UploadMap(format!(
                "mapper answered {} decisions for {} chunks",
                decisions.len(),
                batch.len()
            )));
        }

        debug!(%obj_id, "map batch: write");
        let mut parts = Vec::with_capacity(batch.len());
        let mut chunk_reports = Vec::with_capacity(batch.len());
        for (item, decision) in batch.into_iter().zip(decisions) {
            let range = ByteRange::new(item.start, item.end)?;
            let (chunk_id, report) = match decision {
                AllocationDecision::DupOf { chunk_id } => (
                    chunk_id,
                    ChunkWriteReport {
                        chunk_id,
                        chunk: None,
                        written_blocks: Vec::new(),
                    },
                ),
                AllocationDecision::Write { chunk_id, frags } => {
                    let written = self
                        .write_chunk_blocks(obj_id, range, &item.encoded, &frags)
                        .await?;
                    let chunk = Self::chunk_record(
                        chunk_id,
                        &item.encoded,
                        self.coder_config.clone(),
                        frags,
                    );
                    (
                        chunk_id,
                        ChunkWriteReport {
                            chunk_id,
                            chunk: Some(chunk),
                            written_blocks: written,
                        },
                    )
                }
            };
            chunk_reports.push(report);
            parts.push(PartMd {
                part_id: PartId::new(),
                obj_id,
                multipart_id,
                seq: item.seq,
                start: item.start,
                end: item.end,
                chunk_id,
                chunk_offset: 0,
            });
            // item (and its cipher frames) dropped here, before finalize
        }

        debug!(%obj_id, "map batch: finalize");
        let result = self
            .meta
            .finalize_object_parts(FinalizePartsParams {
                obj_id,
                multipart_id,
                parts,
                chunks: chunk_reports,
            })
            .await?;
        if result.had_errors {
            return Err(ObjectIoError::UploadMap(
                "mapper reported errors finalizing batch".to_string(),
            ));
        }
        debug!(%obj_id, "map batch: done");
        Ok(())
    }

    /// Writes every (fragment, block) pair of one chunk, returning the
    /// blocks that succeeded. Individual failures are reported and
    /// tolerated here; the durability verdict belongs to the mapper.
    async fn write_chunk_blocks(
        &self,
        obj_id: ObjectId,
        range: ByteRange,
        encoded: &EncodedChunk,
        allocations: &[FragmentAllocation],
    ) -> Result<Vec<BlockId>, ObjectIoError> {
        let mut writes = Vec::new();
        for allocation in allocations {
            let frame = encoded
                .frags
                .iter()
                .find(|f| f.kind == allocation.kind && f.index == allocation.index)
                .map(|f| f.frame.clone())
                .ok_or_else(|| {
                    ObjectIoError::UploadMap(format!(
                        "mapper allocated unknown fragment ({:?}, {})",
                        allocation.kind, allocation.index
                    ))
                })?;
            for block in &allocation.blocks {
                writes.push(self.write_one_block(obj_id, range, block.clone(), frame.clone()));
            }
        }

        let results = join_all(writes).await;
        Ok(results.into_iter().flatten().collect())
    }

    async fn write_one_block(
        &self,
        obj_id: ObjectId,
        range: ByteRange,
        block: BlockMd,
        frame: Bytes,
    ) -> Option<BlockId> {
        let outcome = tokio::time::timeout(
            self.write_timeout,
            self.blocks.write_block(&block, frame),
        )
        .await
        .map_err(|_| {
            ObjectIoError::TimeoutError(format!(
                "writing block {} to {}",
                block.block_id, block.node_id
            ))
        })
        .and_then(|r| r);

        match outcome {
            Ok(()) => {
                self.metrics.block_written();
                Some(block.block_id)
            }
            Err(error) => {
                warn!(block = %block.block_id, node = %block.node_id, %error,
                      "block write failed, relying on remaining replicas");
                self.spawn_error_report(obj_id, range, block, error);
                None
            }
        }
    }

    /// Reports one failed block write; report failures are swallowed so
    /// they can never mask the I/O error that triggered them.
    fn spawn_error_report(
        &self,
        obj_id: ObjectId,
        range: ByteRange,
        block: BlockMd,
        error: ObjectIoError,
    ) {
        let meta = Arc::clone(&self.meta);
        tokio::spawn(async move {
            let report = ErrorReport {
                action: IoAction::Write,
                obj_id,
                range: Some(range),
                block: Some(block),
                rpc_code: None,
                message: error.to_string(),
            };
            if let Err(report_error) = meta.report_error_on_object(report).await {
                debug!(%report_error, "error report swallowed");
            }
        });
    }

    fn chunk_record(
        chunk_id: object_io_domain::ChunkId,
        encoded: &EncodedChunk,
        coder: ChunkCoderConfig,
        allocations: Vec<FragmentAllocation>,
    ) -> ChunkInfo {
        let frags = allocations
            .into_iter()
            .map(|allocation| {
                let digest = encoded
                    .frags
                    .iter()
                    .find(|f| f.kind == allocation.kind && f.index == allocation.index)
                    .and_then(|f| f.digest.clone());
                FragmentMd {
                    kind: allocation.kind,
                    index: allocation.index,
                    digest,
                    blocks: allocation.blocks,
                }
            })
            .collect();
        ChunkInfo {
            chunk_id,
            size: encoded.size,
            compressed_size: encoded.compressed_size,
            content_digest: encoded.content_digest.clone(),
            coder,
            cipher_key: encoded.cipher_key.clone(),
            cipher_iv: encoded.cipher_iv.clone(),
            frags,
        }
    }
}
