// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Pipeline
//!
//! The staged upload path, wired as bounded channels between tasks:
//!
//! ```text
//! source ──> splitter ──100──> encoder ──20──> coalescer ──1──> uploader
//!            (C1)              (C2, 20 par.)   (C3)             (C4)
//! ```
//!
//! Each arrow is a bounded `mpsc` channel; a slow downstream stage fills
//! its channel and the upstream `send` waits - backpressure is inherent,
//! never polled. The uploader's watermark of one serializes batch
//! completion in emission order. The outermost admission gate is the
//! engine's byte semaphore, sized from the declared object size before the
//! source is read.
//!
//! ## Failure handling
//!
//! Any stage error tears the pipeline down (channels close, peers drain
//! and exit), a best-effort `abort_object_upload` is issued for
//! whole-object uploads, and the **original** error re-raises. A stage
//! that merely observed its peer's channel close reports `Cancelled`,
//! which loses to any real error when the verdict is picked.
//!
//! ## Memory discipline
//!
//! Chunk plaintext moves `splitter -> encoder` by value and is consumed by
//! the encode call; from there only coded frames travel, and the map
//! client drops them before finalize. At no point do more than
//! `watermark x chunk` buffers exist per stage.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use object_io_domain::services::chunk_splitter::StreamDigests;
use object_io_domain::services::metadata_service::{
    ChunkWriteReport, CompleteMultipartParams, CompleteUploadParams, CreateMultipartParams,
    CreateUploadParams, FinalizePartsParams,
};
use object_io_domain::value_objects::byte_range::ByteRange;
use object_io_domain::value_objects::chunk_coder_config::ChunkCoderConfig;
use object_io_domain::value_objects::chunk_split_config::ChunkSplitConfig;
use object_io_domain::value_objects::ids::{MultipartId, ObjectId, PartId};
use object_io_domain::{ChunkSplitter, ObjectIoError, ObjectMd, PartMd};

use super::engine::ObjectIoEngine;
use super::map_client::{BatchItem, MapUploadClient};
use super::transfer_decoder::ChunkedDecoder;
use crate::application::coalescer::coalesce;

/// Chunks buffered between splitter and encoder.
const SPLITTER_WATERMARK: usize = 100;
/// Encoded chunks buffered before the coalescer.
const ENCODER_WATERMARK: usize = 20;
/// Batches buffered before the uploader; one serializes completion order.
const UPLOADER_WATERMARK: usize = 1;

/// Byte source of an upload.
pub enum UploadSource {
    /// Raw payload bytes.
    Stream(BoxStream<'static, Result<Bytes, ObjectIoError>>),
    /// Payload wrapped in an HTTP chunked-transfer envelope; the envelope
    /// is stripped before splitting.
    ChunkedStream(BoxStream<'static, Result<Bytes, ObjectIoError>>),
    /// Server-side copy of an existing object.
    Copy(CopySource),
}

/// Source description of a copy upload.
#[derive(Debug, Clone)]
pub struct CopySource {
    pub bucket: String,
    pub key: String,
    /// Copy only this byte range of the source; `None` copies everything.
    pub range: Option<ByteRange>,
}

pub struct UploadParams {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    /// Declared stream length, used to size admission. `None` for
    /// unknown-length streams.
    pub size: Option<u64>,
    pub source: UploadSource,
}

/// Parameters of one multipart (one part's pipeline).
pub struct MultipartParams {
    pub obj_id: ObjectId,
    /// 1-based part number.
    pub num: u64,
    pub size: Option<u64>,
    pub source: UploadSource,
}

/// Completion of one multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    pub multipart_id: MultipartId,
    pub size: u64,
    /// Hex MD5 of this part's bytes.
    pub md5: String,
    pub num_parts: u64,
}

struct SplitItem {
    seq: u64,
    start: u64,
    end: u64,
    data: Vec<u8>,
}

struct SplitSummary {
    total_bytes: u64,
    num_chunks: u64,
    digests: StreamDigests,
}

impl ObjectIoEngine {
    /// Uploads one object and returns its completed metadata.
    ///
    /// A same-bucket, whole-object [`UploadSource::Copy`] bypasses the
    /// pipeline entirely: the source's chunk map is re-finalized under the
    /// new object id without moving a byte. Every other source streams
    /// through the full pipeline.
    pub async fn upload_object(
        self: Arc<Self>,
        params: UploadParams,
    ) -> Result<ObjectMd, ObjectIoError> {
        match params.source {
            UploadSource::Copy(copy) if copy.bucket == params.bucket && copy.range.is_none() => {
                self.copy_object_chunks(params.bucket, params.key, copy)
                    .await
            }
            UploadSource::Copy(copy) => {
                let src_md = self.meta.read_object_md(&copy.bucket, &copy.key).await?;
                let range = match copy.range {
                    Some(range) => ByteRange::new(
                        range.start().min(src_md.size),
                        range.end().min(src_md.size),
                    )?,
                    None => ByteRange::new(0, src_md.size)?,
                };
                let stream = self.clone().read_object_stream(super::read::ReadParams {
                    bucket: copy.bucket,
                    key: copy.key,
                    start: Some(range.start()),
                    end: Some(range.end()),
                    requested_size: None,
                });
                self.upload_stream(
                    params.bucket,
                    params.key,
                    params.content_type,
                    Some(range.len()),
                    stream,
                    false,
                )
                .await
            }
            UploadSource::Stream(stream) => {
                self.upload_stream(
                    params.bucket,
                    params.key,
                    params.content_type,
                    params.size,
                    stream,
                    false,
                )
                .await
            }
            UploadSource::ChunkedStream(stream) => {
                self.upload_stream(
                    params.bucket,
                    params.key,
                    params.content_type,
                    params.size,
                    stream,
                    true,
                )
                .await
            }
        }
    }

    /// Uploads one multipart. The part's pipeline runs with `start = 0,
    /// seq = 0`; the metadata service rewrites absolute offsets when the
    /// whole object completes.
    pub async fn upload_multipart(
        &self,
        params: MultipartParams,
    ) -> Result<MultipartUpload, ObjectIoError> {
        let (stream, chunked) = match params.source {
            UploadSource::Stream(s) => (s, false),
            UploadSource::ChunkedStream(s) => (s, true),
            UploadSource::Copy(_) => {
                return Err(ObjectIoError::InvalidConfiguration(
                    "copy sources are not supported for multipart".to_string(),
                ))
            }
        };
        let multipart = self
            .meta
            .create_multipart(CreateMultipartParams {
                obj_id: params.obj_id,
                num: params.num,
                size: params.size,
            })
            .await?;

        let summary = self
            .run_pipeline(
                params.obj_id,
                Some(multipart.multipart_id),
                params.size,
                stream,
                chunked,
                multipart.chunk_split_config.clone(),
                multipart.chunk_coder_config.clone(),
            )
            .await?;

        let md5 = summary
            .digests
            .md5
            .as_ref()
            .map(|d| d.to_hex())
            .unwrap_or_default();
        self.meta
            .complete_multipart(CompleteMultipartParams {
                obj_id: params.obj_id,
                multipart_id: multipart.multipart_id,
                size: summary.total_bytes,
                md5: md5.clone(),
                num_parts: summary.num_chunks,
            })
            .await?;
        Ok(MultipartUpload {
            multipart_id: multipart.multipart_id,
            size: summary.total_bytes,
            md5,
            num_parts: summary.num_chunks,
        })
    }

    async fn upload_stream(
        &self,
        bucket: String,
        key: String,
        content_type: String,
        size: Option<u64>,
        stream: BoxStream<'static, Result<Bytes, ObjectIoError>>,
        chunked: bool,
    ) -> Result<ObjectMd, ObjectIoError> {
        let info = self
            .meta
            .create_object_upload(CreateUploadParams {
                bucket: bucket.clone(),
                key: key.clone(),
                size,
                content_type,
            })
            .await?;
        let obj_id = info.obj_id;

        let result = self
            .run_pipeline(
                obj_id,
                None,
                size,
                stream,
                chunked,
                info.chunk_split_config.clone(),
                info.chunk_coder_config.clone(),
            )
            .await;

        let completion = match result {
            Ok(summary) => {
                let etag = summary
                    .digests
                    .md5
                    .as_ref()
                    .map(|d| d.to_hex())
                    .unwrap_or_default();
                self.meta
                    .complete_object_upload(CompleteUploadParams {
                        obj_id,
                        size: summary.total_bytes,
                        etag,
                        sha256: summary.digests.sha256.as_ref().map(|d| d.to_hex()),
                        num_parts: summary.num_chunks,
                    })
                    .await
            }
            Err(error) => Err(error),
        };

        match completion {
            Ok(md) => {
                info!(%obj_id, size = md.size, parts = md.num_parts, "object upload complete");
                Ok(md)
            }
            Err(error) => {
                // best effort: the abort RPC must never mask the original
                if let Err(abort_error) = self.meta.abort_object_upload(obj_id).await {
                    warn!(%obj_id, %abort_error, "abort after failed upload also failed");
                }
                Err(error)
            }
        }
    }

    /// Runs the staged pipeline over one source stream with the
    /// mapper-provided split and coder configurations.
    #[allow(clippy::too_many_arguments)]
    async fn run_pipeline(
        &self,
        obj_id: ObjectId,
        multipart_id: Option<MultipartId>,
        declared_size: Option<u64>,
        mut source: BoxStream<'static, Result<Bytes, ObjectIoError>>,
        chunked: bool,
        mut split_config: ChunkSplitConfig,
        coder_config: ChunkCoderConfig,
    ) -> Result<SplitSummary, ObjectIoError> {
        // the etag derives from the stream MD5; it is not optional
        split_config.calc_md5 = true;

        // object-size admission precedes the first source read
        let admission = self.config.admission_size(declared_size);
        let _admission_guard = self.acquire_stream_bytes(admission).await?;
        debug!(%obj_id, admission, "upload admitted");

        let (tx_split, rx_split) = mpsc::channel::<SplitItem>(SPLITTER_WATERMARK);
        let (tx_encoded, rx_encoded) = mpsc::channel::<BatchItem>(ENCODER_WATERMARK);
        let (tx_batch, rx_batch) = mpsc::channel::<Vec<BatchItem>>(UPLOADER_WATERMARK);

        // stage 1+2+3: source (+ chunked decode) feeding the splitter
        let splitter_task = tokio::spawn(async move {
            let mut splitter = ChunkSplitter::new(split_config)?;
            let mut decoder = chunked.then(ChunkedDecoder::new);
            let mut offset = 0u64;
            let mut seq = 0u64;

            let mut emit = |chunk: Vec<u8>| {
                let item = SplitItem {
                    seq,
                    start: offset,
                    end: offset + chunk.len() as u64,
                    data: chunk,
                };
                seq += 1;
                offset = item.end;
                item
            };

            while let Some(buffer) = source.next().await {
                let buffer = buffer?;
                let payloads = match decoder.as_mut() {
                    Some(decoder) => decoder.push(&buffer)?,
                    None => vec![buffer],
                };
                for payload in payloads {
                    for chunk in splitter.push(&payload) {
                        let item = emit(chunk);
                        tx_split
                            .send(item)
                            .await
                            .map_err(|_| ObjectIoError::cancelled())?;
                    }
                }
            }
            if let Some(decoder) = decoder {
                decoder.finish()?;
            }
            let (residue, digests) = splitter.finish();
            if let Some(chunk) = residue {
                let item = emit(chunk);
                tx_split
                    .send(item)
                    .await
                    .map_err(|_| ObjectIoError::cancelled())?;
            }
            Ok::<SplitSummary, ObjectIoError>(SplitSummary {
                total_bytes: offset,
                num_chunks: seq,
                digests,
            })
        });

        // stage 4: bounded-concurrency encode, order preserving
        let codec_pool = Arc::clone(&self.codec_pool);
        let encode_concurrency = self.config.encode_concurrency;
        let encoder_coder = coder_config.clone();
        let encoder_task = tokio::spawn(async move {
            let encoded_stream = ReceiverStream::new(rx_split)
                .map(|item| {
                    let pool = Arc::clone(&codec_pool);
                    let coder = encoder_coder.clone();
                    async move {
                        let SplitItem {
                            seq,
                            start,
                            end,
                            data,
                        } = item;
                        let encoded = pool.encode(data, coder).await?;
                        Ok::<BatchItem, ObjectIoError>(BatchItem {
                            seq,
                            start,
                            end,
                            encoded,
                        })
                    }
                })
                .buffered(encode_concurrency);
            futures::pin_mut!(encoded_stream);
            while let Some(result) = encoded_stream.next().await {
                let item = result?;
                tx_encoded
                    .send(item)
                    .await
                    .map_err(|_| ObjectIoError::cancelled())?;
            }
            Ok::<(), ObjectIoError>(())
        });

        // stage 5: coalesce encoded chunks into mapper batches
        let max_length = self.config.coalesce_max_length;
        let max_wait = self.config.coalesce_max_wait();
        let coalescer_task =
            tokio::spawn(
                async move { coalesce(rx_encoded, tx_batch, max_length, max_wait).await },
            );

        // stage 6: one map-client invocation per batch, strictly serialized
        let map_client = MapUploadClient::new(
            Arc::clone(&self.meta),
            Arc::clone(&self.blocks),
            Arc::clone(&self.metrics),
            coder_config,
            self.config.write_block_timeout(),
        );
        let uploader_task = tokio::spawn(async move {
            let mut rx_batch = rx_batch;
            while let Some(batch) = rx_batch.recv().await {
                map_client.upload_batch(obj_id, multipart_id, batch).await?;
            }
            Ok::<(), ObjectIoError>(())
        });

        let (split_result, encode_result, coalesce_result, upload_result) =
            tokio::join!(splitter_task, encoder_task, coalescer_task, uploader_task);

        let mut errors: Vec<ObjectIoError> = Vec::new();
        let summary = match flatten_join(split_result) {
            Ok(summary) => Some(summary),
            Err(error) => {
                errors.push(error);
                None
            }
        };
        for result in [
            flatten_join(upload_result),
            flatten_join(encode_result),
            flatten_join(coalesce_result),
        ] {
            if let Err(error) = result {
                errors.push(error);
            }
        }

        if let Some(error) = pick_pipeline_error(errors) {
            return Err(error);
        }
        summary.ok_or_else(|| ObjectIoError::internal("splitter finished without a summary"))
    }

    /// Zero-byte copy: re-finalize the source's chunk map under a new
    /// object id.
    async fn copy_object_chunks(
        &self,
        bucket: String,
        key: String,
        copy: CopySource,
    ) -> Result<ObjectMd, ObjectIoError> {
        let src_md = self.meta.read_object_md(&copy.bucket, &copy.key).await?;
        let info = self
            .meta
            .create_object_upload(CreateUploadParams {
                bucket,
                key,
                size: Some(src_md.size),
                content_type: src_md.content_type.clone(),
            })
            .await?;
        let obj_id = info.obj_id;

        let result = async {
            let mappings = self
                .meta
                .read_object_mappings(src_md.obj_id, ByteRange::new(0, src_md.size)?)
                .await?;

            let mut parts = Vec::with_capacity(mappings.len());
            let mut chunks = Vec::with_capacity(mappings.len());
            for (seq, mapping) in mappings.into_iter().enumerate() {
                parts.push(PartMd {
                    part_id: PartId::new(),
                    obj_id,
                    multipart_id: None,
                    seq: seq as u64,
                    start: mapping.part.start,
                    end: mapping.part.end,
                    chunk_id: mapping.part.chunk_id,
                    chunk_offset: mapping.part.chunk_offset,
                });
                chunks.push(ChunkWriteReport {
                    chunk_id: mapping.part.chunk_id,
                    chunk: None,
                    written_blocks: Vec::new(),
                });
            }
            let num_parts = parts.len() as u64;

            let finalize = self
                .meta
                .finalize_object_parts(FinalizePartsParams {
                    obj_id,
                    multipart_id: None,
                    parts,
                    chunks,
                })
                .await?;
            if finalize.had_errors {
                return Err(ObjectIoError::UploadMap(
                    "mapper reported errors finalizing copy".to_string(),
                ));
            }

            self.meta
                .complete_object_upload(CompleteUploadParams {
                    obj_id,
                    size: src_md.size,
                    etag: src_md.etag.clone(),
                    sha256: src_md.sha256.clone(),
                    num_parts,
                })
                .await
        }
        .await;

        match result {
            Ok(md) => {
                info!(src = %src_md.obj_id, dst = %obj_id, "zero-byte copy complete");
                Ok(md)
            }
            Err(error) => {
                if let Err(abort_error) = self.meta.abort_object_upload(obj_id).await {
                    warn!(%obj_id, %abort_error, "abort after failed copy also failed");
                }
                Err(error)
            }
        }
    }
}

fn flatten_join<T>(
    result: Result<Result<T, ObjectIoError>, tokio::task::JoinError>,
) -> Result<T, ObjectIoError> {
    result
        .map_err(|e| ObjectIoError::internal(format!("pipeline task panicked: {}", e)))
        .and_then(|r| r)
}

/// Picks the batch verdict: the first *real* error wins; `Cancelled` only
/// surfaces when no stage reported anything better (a stage that saw its
/// peer's channel close is a casualty, not the cause).
fn pick_pipeline_error(errors: Vec<ObjectIoError>) -> Option<ObjectIoError> {
    errors
        .iter()
        .find(|e| !matches!(e, ObjectIoError::Cancelled(_)))
        .cloned()
        .or_else(|| errors.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_pipeline_error_prefers_real_errors() {
        let verdict = pick_pipeline_error(vec![
            ObjectIoError::cancelled(),
            ObjectIoError::UploadMap("durability".into()),
            ObjectIoError::cancelled(),
        ]);
        assert!(matches!(verdict, Some(ObjectIoError::UploadMap(_))));

        let verdict = pick_pipeline_error(vec![ObjectIoError::cancelled()]);
        assert!(matches!(verdict, Some(ObjectIoError::Cancelled(_))));

        assert!(pick_pipeline_error(Vec::new()).is_none());
    }
}
