// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object I/O Domain
//!
//! The domain layer of the client-side object I/O engine. It holds the pure
//! business objects and algorithms of chunked object storage - what a chunk,
//! fragment, block, and part *are*, how a byte stream is split into
//! content-defined chunks, and what contracts the outside world (the
//! metadata service, the block-store agents, the chunk codec) must satisfy.
//! It is independent of the async runtime, network transports, and any
//! concrete storage backend.
//!
//! ## Module Structure
//!
//! - [`error`] - the single `ObjectIoError` type used across the workspace
//! - [`value_objects`] - identifiers, digests, byte ranges, and the chunk
//!   split / coder configurations
//! - [`entities`] - object metadata and the chunk/fragment/block/part
//!   mapping records
//! - [`services`] - the rolling-hash chunk splitter, the chunk codec
//!   contract, and the async ports to the metadata service and block stores
//!
//! ## Data Model
//!
//! An **object** is an ordered list of **parts**; each part places one
//! **chunk** (a content-defined byte range of the stream) at `[start, end)`.
//! A chunk is erasure-coded into **fragments** (data / parity /
//! local-reconstruction), and each fragment is replicated as **blocks** on
//! storage agents. Any `data_frags` fragments of a chunk suffice to
//! reconstruct its plaintext.
//!
//! ## Design Notes
//!
//! Entities and value objects are plain serde-serializable data; async
//! traits in [`services`] are infrastructure ports implemented by the
//! engine crate (or by test doubles). CPU-bound domain services (the
//! splitter, the codec contract) are synchronous; async execution is an
//! engine concern.

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

// Re-export the most commonly used types at the crate root
pub use entities::{BlockMd, ChunkInfo, FragmentMd, ObjectMd, PartInfo, PartMd};
pub use error::ObjectIoError;
pub use services::chunk_codec::{ChunkCodec, EncodedChunk, EncodedFragment, RecoveredFragment};
pub use services::chunk_splitter::{ChunkSplitter, StreamDigests};
pub use services::metadata_service::MetadataService;
pub use services::block_store_service::BlockStore;
pub use value_objects::{
    ByteRange, ChunkCoderConfig, ChunkSplitConfig, Digest, DigestKind, FragmentKind,
};
pub use value_objects::ids::{BlockId, ChunkId, MultipartId, NodeId, ObjectId, PartId};
