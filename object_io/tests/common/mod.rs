// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared test harness: an engine wired to in-memory adapters with a
//! scaled-down configuration (small chunks, small cache alignment) so the
//! pipelines exercise many chunks and windows quickly.

// not every test target uses every helper
#![allow(dead_code)]

use bytes::Bytes;
use futures::stream;
use md5::{Digest as _, Md5};
use std::sync::Arc;

use object_io::infrastructure::adapters::{MemoryBlockStore, MemoryMetadataService};
use object_io::infrastructure::codec::StripeChunkCodec;
use object_io::{
    BlockStore, ChunkCodec, IoConfig, MetadataService, ObjectIoEngine, ObjectIoError,
    UploadParams, UploadSource,
};
use object_io_domain::value_objects::chunk_coder_config::ChunkCoderConfig;
use object_io_domain::value_objects::chunk_split_config::ChunkSplitConfig;
use object_io_domain::value_objects::ids::NodeId;

pub struct TestCluster {
    pub engine: Arc<ObjectIoEngine>,
    pub meta: Arc<MemoryMetadataService>,
    pub blocks: Arc<MemoryBlockStore>,
}

pub fn test_config() -> IoConfig {
    IoConfig {
        object_range_align: 64 * 1024,
        object_range_cache_cap: 4 * 1024 * 1024,
        read_range_concurrency: 4,
        read_concurrency_global: 64,
        read_concurrency_agent: 8,
        semaphore_cap: 32 * 1024 * 1024,
        stream_semaphore_timeout_ms: 5_000,
        stream_semaphore_size_cap: 8 * 1024 * 1024,
        stream_minimal_size_lock: 64 * 1024,
        read_block_timeout_ms: 2_000,
        write_block_timeout_ms: 2_000,
        video_prefetch_load_cap: 10,
        error_injection_on_read: 0.0,
        encode_concurrency: 4,
        coalesce_max_length: 4,
        coalesce_max_wait_ms: 5,
    }
}

/// Small chunks so a few hundred KiB exercises many of them.
pub fn test_split_config() -> ChunkSplitConfig {
    ChunkSplitConfig {
        min_chunk: 4 * 1024,
        max_chunk: 16 * 1024,
        avg_chunk_bits: 12,
        calc_md5: true,
        calc_sha256: true,
    }
}

pub fn cluster(nodes: usize, replicas: usize) -> TestCluster {
    cluster_with(test_config(), nodes, replicas)
}

pub fn cluster_with(config: IoConfig, nodes: usize, replicas: usize) -> TestCluster {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let node_ids: Vec<NodeId> = (0..nodes).map(|i| NodeId::new(format!("node-{}", i))).collect();
    let meta = Arc::new(
        MemoryMetadataService::new(node_ids, replicas)
            .with_configs(test_split_config(), ChunkCoderConfig::default()),
    );
    let blocks = Arc::new(MemoryBlockStore::new());
    let engine = Arc::new(
        ObjectIoEngine::new(
            config,
            Arc::clone(&meta) as Arc<dyn MetadataService>,
            Arc::clone(&blocks) as Arc<dyn BlockStore>,
            Arc::new(StripeChunkCodec::new()) as Arc<dyn ChunkCodec>,
        )
        .expect("engine config"),
    );
    TestCluster {
        engine,
        meta,
        blocks,
    }
}

/// A second engine over the same adapters (fresh cache and governors).
pub fn sibling_engine(cluster: &TestCluster, config: IoConfig) -> Arc<ObjectIoEngine> {
    Arc::new(
        ObjectIoEngine::new(
            config,
            Arc::clone(&cluster.meta) as Arc<dyn MetadataService>,
            Arc::clone(&cluster.blocks) as Arc<dyn BlockStore>,
            Arc::new(StripeChunkCodec::new()) as Arc<dyn ChunkCodec>,
        )
        .expect("engine config"),
    )
}

/// Deterministic pseudo-random payloads (xorshift64*-style mixer).
pub fn pseudo_bytes(mut seed: u64, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 8);
    while out.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        out.extend_from_slice(&seed.to_le_bytes());
    }
    out.truncate(len);
    out
}

/// An upload source delivering `data` in `piece`-sized buffers.
pub fn byte_source(data: &[u8], piece: usize) -> UploadSource {
    let buffers: Vec<Result<Bytes, ObjectIoError>> = data
        .chunks(piece.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    UploadSource::Stream(Box::pin(stream::iter(buffers)))
}

pub fn upload_params(bucket: &str, key: &str, data: &[u8], piece: usize) -> UploadParams {
    UploadParams {
        bucket: bucket.to_string(),
        key: key.to_string(),
        content_type: "application/octet-stream".to_string(),
        size: Some(data.len() as u64),
        source: byte_source(data, piece),
    }
}

pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Wraps `data` in an HTTP chunked-transfer envelope.
pub fn chunked_envelope(data: &[u8], piece: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 64);
    for chunk in data.chunks(piece.max(1)) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}
