// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Mapping Entities
//!
//! The mapping tree the metadata service maintains and the engine consumes:
//!
//! ```text
//! Object ── Part (seq, [start,end), chunk_offset) ──> Chunk
//!                                                       │
//!                                   Fragment (kind, index, digest)
//!                                                       │
//!                                   Block (block_id, node_id, address)
//! ```
//!
//! Parts and chunks reference each other by id rather than owning each
//! other; a mapping response pairs them explicitly in [`PartInfo`]. This
//! keeps dedup natural - many parts across many objects may point at one
//! chunk record.
//!
//! ## Invariants
//!
//! - Within one object, parts are contiguous and ordered by `start`, and
//!   `end - start == chunk.size - chunk_offset` for the mapped window.
//! - Fragments of a chunk are ordered by `(kind, index)`.
//! - Each fragment's `blocks` list is ordered by the mapper's replica
//!   preference; readers try them sequentially.

use serde::{Deserialize, Serialize};

use crate::value_objects::chunk_coder_config::{ChunkCoderConfig, FragmentKind};
use crate::value_objects::digest::Digest;
use crate::value_objects::ids::{BlockId, ChunkId, MultipartId, NodeId, ObjectId, PartId};

/// One stored replica of one fragment on one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMd {
    pub block_id: BlockId,
    pub node_id: NodeId,
    /// Transport address of the agent holding the block.
    pub address: String,
    /// Digest of the fragment frame this block replicates, when recorded.
    pub digest: Option<Digest>,
}

/// One fragment of one chunk, with its replica blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMd {
    pub kind: FragmentKind,
    pub index: u32,
    pub digest: Option<Digest>,
    pub blocks: Vec<BlockMd>,
}

/// A deduplicated chunk record: coding parameters plus fragment layout.
///
/// `cipher_key` / `cipher_iv` are present when the coder config carries a
/// cipher; the codec needs them to decode. `compressed_size` is the frame
/// length after compression and before striping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub chunk_id: ChunkId,
    pub size: u64,
    pub compressed_size: u64,
    pub content_digest: Digest,
    pub coder: ChunkCoderConfig,
    #[serde(with = "hex::serde")]
    pub cipher_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub cipher_iv: Vec<u8>,
    pub frags: Vec<FragmentMd>,
}

impl ChunkInfo {
    /// Fragments of a given kind, in index order.
    pub fn frags_of_kind(&self, kind: FragmentKind) -> impl Iterator<Item = &FragmentMd> {
        self.frags.iter().filter(move |f| f.kind == kind)
    }
}

/// Placement of one chunk window into an object range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartMd {
    pub part_id: PartId,
    pub obj_id: ObjectId,
    pub multipart_id: Option<MultipartId>,
    pub seq: u64,
    pub start: u64,
    pub end: u64,
    pub chunk_id: ChunkId,
    /// Offset into the chunk's plaintext where this part's window begins.
    /// Zero for whole-chunk parts; nonzero after range copies.
    pub chunk_offset: u64,
}

/// A part paired with the chunk record it references, as returned by
/// `read_object_mappings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    pub part: PartMd,
    pub chunk: ChunkInfo,
}
