// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Metadata Service
//!
//! A [`MetadataService`] that keeps object/part/chunk bookkeeping in
//! process-local maps. It implements the same protocol a real mapper
//! would:
//!
//! - allocation answers dedup references for known content digests (when
//!   `check_dups` is on) and round-robins new blocks across its node pool;
//! - finalize records chunk/part placements and flags `had_errors` when a
//!   written chunk has a fragment with no surviving block;
//! - completion rewrites multipart-relative part offsets into absolute
//!   object offsets and publishes the authoritative `ObjectMd`.
//!
//! Error and stress reports are captured for inspection by tests.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

use object_io_domain::entities::chunk_map::{BlockMd, ChunkInfo, PartInfo, PartMd};
use object_io_domain::entities::object_md::ObjectMd;
use object_io_domain::services::metadata_service::{
    AllocationDecision, ChunkAllocationRequest, CompleteMultipartParams, CompleteUploadParams,
    CreateMultipartParams, CreateUploadParams, EndpointProblemReport, ErrorReport,
    FinalizePartsParams, FinalizeResult, FragmentAllocation, MetadataService, MultipartInfo,
    ObjectUploadInfo,
};
use object_io_domain::value_objects::byte_range::ByteRange;
use object_io_domain::value_objects::chunk_coder_config::ChunkCoderConfig;
use object_io_domain::value_objects::chunk_split_config::ChunkSplitConfig;
use object_io_domain::value_objects::digest::Digest;
use object_io_domain::value_objects::ids::{BlockId, ChunkId, MultipartId, NodeId, ObjectId};
use object_io_domain::ObjectIoError;

struct UploadRecord {
    bucket: String,
    key: String,
    content_type: String,
    parts: Vec<PartMd>,
}

struct MultipartRecord {
    obj_id: ObjectId,
    num: u64,
    completed: bool,
}

#[derive(Default)]
struct MetaState {
    uploads: HashMap<ObjectId, UploadRecord>,
    multiparts: HashMap<MultipartId, MultipartRecord>,
    objects_by_key: HashMap<(String, String), ObjectMd>,
    objects_by_id: HashMap<ObjectId, ObjectMd>,
    parts_by_object: HashMap<ObjectId, Vec<PartMd>>,
    chunks: HashMap<ChunkId, ChunkInfo>,
    dedup_index: HashMap<Digest, ChunkId>,
    next_node: usize,
    aborted: Vec<ObjectId>,
    error_reports: Vec<ErrorReport>,
    stress_reports: Vec<EndpointProblemReport>,
}

/// Metadata service over process-local maps.
pub struct MemoryMetadataService {
    state: Mutex<MetaState>,
    nodes: Vec<NodeId>,
    replicas: usize,
    check_dups: bool,
    split_config: ChunkSplitConfig,
    coder_config: ChunkCoderConfig,
}

impl MemoryMetadataService {
    /// A mapper over `nodes`, writing `replicas` blocks per fragment.
    pub fn new(nodes: Vec<NodeId>, replicas: usize) -> Self {
        assert!(!nodes.is_empty(), "node pool cannot be empty");
        assert!(replicas >= 1);
        Self {
            state: Mutex::new(MetaState::default()),
            nodes,
            replicas,
            check_dups: true,
            split_config: ChunkSplitConfig::default(),
            coder_config: ChunkCoderConfig::default(),
        }
    }

    /// Overrides the configurations handed to uploads.
    pub fn with_configs(
        mut self,
        split_config: ChunkSplitConfig,
        coder_config: ChunkCoderConfig,
    ) -> Self {
        self.split_config = split_config;
        self.coder_config = coder_config;
        self
    }

    pub fn with_check_dups(mut self, check_dups: bool) -> Self {
        self.check_dups = check_dups;
        self
    }

    // ---- test inspection ----

    pub fn aborted_uploads(&self) -> Vec<ObjectId> {
        self.state.lock().aborted.clone()
    }

    pub fn error_reports(&self) -> Vec<ErrorReport> {
        self.state.lock().error_reports.clone()
    }

    pub fn stress_reports(&self) -> Vec<EndpointProblemReport> {
        self.state.lock().stress_reports.clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.state.lock().chunks.len()
    }

    /// Blocks of every fragment of every chunk mapped for `obj_id`.
    pub fn blocks_of_object(&self, obj_id: ObjectId) -> Vec<BlockMd> {
        let state = self.state.lock();
        let mut blocks = Vec::new();
        if let Some(parts) = state.parts_by_object.get(&obj_id) {
            for part in parts {
                if let Some(chunk) = state.chunks.get(&part.chunk_id) {
                    for frag in &chunk.frags {
                        blocks.extend(frag.blocks.iter().cloned());
                    }
                }
            }
        }
        blocks
    }

    fn next_blocks(&self, state: &mut MetaState, digest: Option<&Digest>) -> Vec<BlockMd> {
        (0..self.replicas)
            .map(|_| {
                let node = self.nodes[state.next_node % self.nodes.len()].clone();
                state.next_node += 1;
                BlockMd {
                    block_id: BlockId::new(),
                    address: format!("mem://{}", node),
                    node_id: node,
                    digest: digest.cloned(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl MetadataService for MemoryMetadataService {
    async fn create_object_upload(
        &self,
        params: CreateUploadParams,
    ) -> Result<ObjectUploadInfo, ObjectIoError> {
        let obj_id = ObjectId::new();
        let mut state = self.state.lock();
        state.uploads.insert(
            obj_id,
            UploadRecord {
                bucket: params.bucket,
                key: params.key,
                content_type: params.content_type,
                parts: Vec::new(),
            },
        );
        Ok(ObjectUploadInfo {
            obj_id,
            bucket_id: "bucket-1".to_string(),
            tier_id: "tier-1".to_string(),
            chunk_split_config: self.split_config.clone(),
            chunk_coder_config: self.coder_config.clone(),
            check_dups: self.check_dups,
        })
    }

    async fn create_multipart(
        &self,
        params: CreateMultipartParams,
    ) -> Result<MultipartInfo, ObjectIoError> {
        let mut state = self.state.lock();
        if !state.uploads.contains_key(&params.obj_id) {
            return Err(ObjectIoError::rpc(format!(
                "no upload in progress for {}",
                params.obj_id
            )));
        }
        let multipart_id = MultipartId::new();
        state.multiparts.insert(
            multipart_id,
            MultipartRecord {
                obj_id: params.obj_id,
                num: params.num,
                completed: false,
            },
        );
        Ok(MultipartInfo {
            multipart_id,
            chunk_split_config: self.split_config.clone(),
            chunk_coder_config: self.coder_config.clone(),
        })
    }

    async fn complete_object_upload(
        &self,
        params: CompleteUploadParams,
    ) -> Result<ObjectMd, ObjectIoError> {
        let mut state = self.state.lock();
        let upload = state
            .uploads
            .remove(&params.obj_id)
            .ok_or_else(|| ObjectIoError::rpc(format!("no upload for {}", params.obj_id)))?;

        // order parts by (multipart num, seq) and rewrite offsets to be
        // absolute within the object
        let mut parts = upload.parts;
        let multipart_num = |part: &PartMd| -> u64 {
            part.multipart_id
                .and_then(|id| state.multiparts.get(&id).map(|m| m.num))
                .unwrap_or(0)
        };
        parts.sort_by_key(|p| (multipart_num(p), p.seq));
        let mut offset = 0u64;
        for (seq, part) in parts.iter_mut().enumerate() {
            let len = part.end - part.start;
            part.seq = seq as u64;
            part.start = offset;
            part.end = offset + len;
            offset += len;
        }

        if offset != params.size {
            return Err(ObjectIoError::rpc(format!(
                "declared size {} does not match mapped bytes {}",
                params.size, offset
            )));
        }

        let md = ObjectMd {
            obj_id: params.obj_id,
            bucket: upload.bucket.clone(),
            key: upload.key.clone(),
            size: params.size,
            content_type: upload.content_type,
            etag: params.etag,
            create_time: Utc::now(),
            sha256: params.sha256,
            num_parts: params.num_parts,
        };
        state
            .objects_by_key
            .insert((upload.bucket, upload.key), md.clone());
        state.objects_by_id.insert(params.obj_id, md.clone());
        state.parts_by_object.insert(params.obj_id, parts);
        Ok(md)
    }

    async fn complete_multipart(
        &self,
        params: CompleteMultipartParams,
    ) -> Result<(), ObjectIoError> {
        let mut state = self.state.lock();
        let multipart = state
            .multiparts
            .get_mut(&params.multipart_id)
            .ok_or_else(|| ObjectIoError::rpc("no such multipart"))?;
        if multipart.obj_id != params.obj_id {
            return Err(ObjectIoError::rpc("multipart belongs to another object"));
        }
        multipart.completed = true;
        Ok(())
    }

    async fn abort_object_upload(&self, obj_id: ObjectId) -> Result<(), ObjectIoError> {
        let mut state = self.state.lock();
        state.uploads.remove(&obj_id);
        state.aborted.push(obj_id);
        Ok(())
    }

    async fn read_object_md(&self, bucket: &str, key: &str) -> Result<ObjectMd, ObjectIoError> {
        self.state
            .lock()
            .objects_by_key
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectIoError::rpc(format!("no such object {}/{}", bucket, key)))
    }

    async fn read_object_mappings(
        &self,
        obj_id: ObjectId,
        range: ByteRange,
    ) -> Result<Vec<PartInfo>, ObjectIoError> {
        let state = self.state.lock();
        let parts = state
            .parts_by_object
            .get(&obj_id)
            .ok_or_else(|| ObjectIoError::rpc(format!("no mappings for {}", obj_id)))?;
        let mut mapped = Vec::new();
        for part in parts {
            if part.start < range.end() && part.end > range.start() {
                let chunk = state.chunks.get(&part.chunk_id).ok_or_else(|| {
                    ObjectIoError::rpc(format!("dangling chunk {}", part.chunk_id))
                })?;
                mapped.push(PartInfo {
                    part: part.clone(),
                    chunk: chunk.clone(),
                });
            }
        }
        Ok(mapped)
    }

    async fn allocate_chunks(
        &self,
        _obj_id: ObjectId,
        requests: Vec<ChunkAllocationRequest>,
    ) -> Result<Vec<AllocationDecision>, ObjectIoError> {
        let mut state = self.state.lock();
        let mut decisions = Vec::with_capacity(requests.len());
        for request in requests {
            let dup = self
                .check_dups
                .then(|| state.dedup_index.get(&request.content_digest).copied())
                .flatten();
            if let Some(chunk_id) = dup {
                decisions.push(AllocationDecision::DupOf { chunk_id });
                continue;
            }
            let frags = request
                .frag_digests
                .iter()
                .map(|(kind, index, digest)| FragmentAllocation {
                    kind: *kind,
                    index: *index,
                    blocks: self.next_blocks(&mut state, digest.as_ref()),
                })
                .collect();
            decisions.push(AllocationDecision::Write {
                chunk_id: ChunkId::new(),
                frags,
            });
        }
        Ok(decisions)
    }

    async fn finalize_object_parts(
        &self,
        params: FinalizePartsParams,
    ) -> Result<FinalizeResult, ObjectIoError> {
        let mut state = self.state.lock();
        let mut had_errors = false;

        for report in params.chunks {
            match report.chunk {
                Some(chunk) => {
                    // durability floor: every fragment keeps at least one
                    // written block
                    for frag in &chunk.frags {
                        let surviving = frag
                            .blocks
                            .iter()
                            .filter(|b| report.written_blocks.contains(&b.block_id))
                            .count();
                        if surviving == 0 {
                            had_errors = true;
                        }
                    }
                    state
                        .dedup_index
                        .insert(chunk.content_digest.clone(), report.chunk_id);
                    state.chunks.insert(report.chunk_id, chunk);
                }
                None => {
                    if !state.chunks.contains_key(&report.chunk_id) {
                        had_errors = true;
                    }
                }
            }
        }

        match state.uploads.get_mut(&params.obj_id) {
            Some(upload) => upload.parts.extend(params.parts),
            None => had_errors = true,
        }
        Ok(FinalizeResult { had_errors })
    }

    async fn report_error_on_object(&self, report: ErrorReport) -> Result<(), ObjectIoError> {
        self.state.lock().error_reports.push(report);
        Ok(())
    }

    async fn report_endpoint_problems(
        &self,
        report: EndpointProblemReport,
    ) -> Result<(), ObjectIoError> {
        self.state.lock().stress_reports.push(report);
        Ok(())
    }
}
