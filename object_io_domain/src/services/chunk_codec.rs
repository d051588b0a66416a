// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Codec Contract
//!
//! The encode/decode kernel boundary. The engine treats the codec as a
//! black box satisfying this contract:
//!
//! - **encode**: plaintext in; content digest, optional compression,
//!   optional per-chunk cipher (fresh key/IV), and erasure fragments out.
//!   Fragments are ordered by `(kind, index)` and each carries its digest.
//! - **decode**: any `data_frags` fragments of the chunk (plus the chunk's
//!   coding metadata) reproduce the plaintext exactly.
//!
//! Both operations are synchronous and CPU-bound; the engine runs them on
//! a bounded worker pool. `encode` takes plaintext **by value** - callers
//! must not retain the buffer past the call, which is how the upload
//! pipeline caps its memory.

use bytes::Bytes;

use crate::entities::chunk_map::ChunkInfo;
use crate::error::ObjectIoError;
use crate::value_objects::chunk_coder_config::{ChunkCoderConfig, FragmentKind};
use crate::value_objects::digest::Digest;

/// One coded fragment frame, ready to be replicated as blocks.
#[derive(Debug, Clone)]
pub struct EncodedFragment {
    pub kind: FragmentKind,
    pub index: u32,
    pub digest: Option<Digest>,
    pub frame: Bytes,
}

/// Result of encoding one chunk.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// Plaintext length.
    pub size: u64,
    /// Frame length after compression, before striping.
    pub compressed_size: u64,
    /// Digest of the plaintext - the deduplication key.
    pub content_digest: Digest,
    /// Cipher key/IV minted for this chunk; empty when the config has no
    /// cipher.
    pub cipher_key: Vec<u8>,
    pub cipher_iv: Vec<u8>,
    /// Fragments ordered by `(kind, index)`.
    pub frags: Vec<EncodedFragment>,
}

/// A fragment frame recovered from block reads, fed back into `decode`.
#[derive(Debug, Clone)]
pub struct RecoveredFragment {
    pub kind: FragmentKind,
    pub index: u32,
    pub frame: Bytes,
}

/// The in-process encode/decode kernel.
pub trait ChunkCodec: Send + Sync {
    /// Encodes one chunk. Consumes the plaintext; implementations and
    /// callers alike must not keep it alive afterwards.
    fn encode(
        &self,
        plaintext: Vec<u8>,
        config: &ChunkCoderConfig,
    ) -> Result<EncodedChunk, ObjectIoError>;

    /// Decodes one chunk from recovered fragments. Succeeds with any
    /// `data_frags` fragments; returns
    /// [`ObjectIoError::Reconstruction`] when too few usable fragments
    /// remain.
    fn decode(
        &self,
        chunk: &ChunkInfo,
        frags: Vec<RecoveredFragment>,
    ) -> Result<Vec<u8>, ObjectIoError>;
}
