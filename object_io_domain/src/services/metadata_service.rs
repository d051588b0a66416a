// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metadata Service Port
//!
//! Async port to the metadata service - the external collaborator that
//! owns object/part/chunk/fragment bookkeeping, allocation decisions, and
//! duplicate detection. The engine executes what this port returns; it
//! never makes placement decisions itself.
//!
//! ## Upload protocol
//!
//! 1. `create_object_upload` registers the upload and returns the split
//!    and coder configurations the client must use.
//! 2. `allocate_chunks` submits content and fragment digests for a batch;
//!    the answer per chunk is either a dedup reference (no writes needed)
//!    or per-fragment block targets.
//! 3. After block writes, `finalize_object_parts` commits part placements
//!    and reports which blocks were actually written.
//! 4. `complete_object_upload` (or `complete_multipart`) seals the stream
//!    with its digests; `abort_object_upload` is the best-effort failure
//!    path.
//!
//! Error and stress reports (`report_error_on_object`,
//! `report_endpoint_problems`) are fire-and-forget: failures of the report
//! itself are swallowed by the caller and never mask the original error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::chunk_map::{BlockMd, ChunkInfo, PartInfo, PartMd};
use crate::entities::object_md::ObjectMd;
use crate::error::ObjectIoError;
use crate::value_objects::byte_range::ByteRange;
use crate::value_objects::chunk_coder_config::{ChunkCoderConfig, FragmentKind};
use crate::value_objects::chunk_split_config::ChunkSplitConfig;
use crate::value_objects::digest::Digest;
use crate::value_objects::ids::{BlockId, ChunkId, MultipartId, ObjectId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUploadParams {
    pub bucket: String,
    pub key: String,
    /// Declared stream length; `None` for unknown-length streams.
    pub size: Option<u64>,
    pub content_type: String,
}

/// Upload registration: the identity plus the configurations the client
/// must split and code with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectUploadInfo {
    pub obj_id: ObjectId,
    pub bucket_id: String,
    pub tier_id: String,
    pub chunk_split_config: ChunkSplitConfig,
    pub chunk_coder_config: ChunkCoderConfig,
    /// When set, duplicate chunks are never written - the allocation
    /// answer is a dedup reference instead.
    pub check_dups: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMultipartParams {
    pub obj_id: ObjectId,
    /// 1-based part number within the multipart upload.
    pub num: u64,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartInfo {
    pub multipart_id: MultipartId,
    /// The configurations this part must split and code with - the same
    /// ones the object's upload was registered with.
    pub chunk_split_config: ChunkSplitConfig,
    pub chunk_coder_config: ChunkCoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteMultipartParams {
    pub obj_id: ObjectId,
    pub multipart_id: MultipartId,
    pub size: u64,
    pub md5: String,
    pub num_parts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteUploadParams {
    pub obj_id: ObjectId,
    pub size: u64,
    /// Hex MD5 of the stream, as computed by the splitter.
    pub etag: String,
    pub sha256: Option<String>,
    pub num_parts: u64,
}

/// Digest evidence for one chunk of an allocation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAllocationRequest {
    pub size: u64,
    pub compressed_size: u64,
    pub content_digest: Digest,
    pub frag_digests: Vec<(FragmentKind, u32, Option<Digest>)>,
}

/// Block targets for one fragment of a chunk to be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentAllocation {
    pub kind: FragmentKind,
    pub index: u32,
    /// One target per replica, in the mapper's preference order.
    pub blocks: Vec<BlockMd>,
}

/// The mapper's answer for one chunk of an allocation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AllocationDecision {
    /// The chunk already exists; reference it, write nothing.
    DupOf { chunk_id: ChunkId },
    /// New chunk: write each fragment to its allocated blocks.
    Write {
        chunk_id: ChunkId,
        frags: Vec<FragmentAllocation>,
    },
}

/// Per-chunk outcome reported at finalize time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkWriteReport {
    pub chunk_id: ChunkId,
    /// Full record for newly written chunks; `None` for dedup references.
    pub chunk: Option<ChunkInfo>,
    /// Blocks that were written successfully.
    pub written_blocks: Vec<BlockId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizePartsParams {
    pub obj_id: ObjectId,
    pub multipart_id: Option<MultipartId>,
    pub parts: Vec<PartMd>,
    pub chunks: Vec<ChunkWriteReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResult {
    /// Set when the mapper could not commit the batch (for example the
    /// durability floor was not met). Fatal for the upload.
    pub had_errors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoAction {
    Read,
    Write,
}

/// Asynchronous per-block failure report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub action: IoAction,
    pub obj_id: ObjectId,
    pub range: Option<ByteRange>,
    pub block: Option<BlockMd>,
    pub rpc_code: Option<String>,
    pub message: String,
}

/// Out-of-band stress report (at most one per hour per engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointProblemReport {
    pub message: String,
}

/// The metadata service RPC surface the engine consumes.
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn create_object_upload(
        &self,
        params: CreateUploadParams,
    ) -> Result<ObjectUploadInfo, ObjectIoError>;

    async fn create_multipart(
        &self,
        params: CreateMultipartParams,
    ) -> Result<MultipartInfo, ObjectIoError>;

    async fn complete_object_upload(
        &self,
        params: CompleteUploadParams,
    ) -> Result<ObjectMd, ObjectIoError>;

    async fn complete_multipart(
        &self,
        params: CompleteMultipartParams,
    ) -> Result<(), ObjectIoError>;

    async fn abort_object_upload(&self, obj_id: ObjectId) -> Result<(), ObjectIoError>;

    async fn read_object_md(&self, bucket: &str, key: &str) -> Result<ObjectMd, ObjectIoError>;

    async fn read_object_mappings(
        &self,
        obj_id: ObjectId,
        range: ByteRange,
    ) -> Result<Vec<PartInfo>, ObjectIoError>;

    async fn allocate_chunks(
        &self,
        obj_id: ObjectId,
        requests: Vec<ChunkAllocationRequest>,
    ) -> Result<Vec<AllocationDecision>, ObjectIoError>;

    async fn finalize_object_parts(
        &self,
        params: FinalizePartsParams,
    ) -> Result<FinalizeResult, ObjectIoError>;

    async fn report_error_on_object(&self, report: ErrorReport) -> Result<(), ObjectIoError>;

    async fn report_endpoint_problems(
        &self,
        report: EndpointProblemReport,
    ) -> Result<(), ObjectIoError>;
}
