// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object IO
//!
//! The client-side object I/O engine of a distributed object store. It
//! turns an opaque byte stream into content-defined, erasure-coded,
//! deduplicated, integrity-protected chunks persisted across storage
//! agents - and reconstructs object bytes from those chunks with bounded
//! memory and concurrency.
//!
//! ## Architecture Overview
//!
//! ```text
//! upload:  source ──> splitter ──> encoder ──> coalescer ──> map client
//!          (bounded channels between every stage; byte-semaphore admission)
//!
//! read:    stream pull ──> range cache ──> mappings ──> fragment fetch
//!                                             │             │
//!                                         part decode <── block reads
//!          (global + per-agent read semaphores; bounded LRU by bytes)
//! ```
//!
//! The engine executes what the metadata service decides: it never makes
//! placement or durability decisions, and it consumes the encode/decode
//! kernel as a black box behind [`object_io_domain::ChunkCodec`].
//!
//! ## Layers
//!
//! - [`infrastructure`] - configuration, concurrency governors, the range
//!   LRU cache, the reference stripe codec, concurrency metrics, and
//!   in-memory adapters for the two external service ports
//! - [`application`] - the upload pipeline, coalescer, map client, read
//!   path, and the [`application::engine::ObjectIoEngine`] facade
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let engine = ObjectIoEngine::new(config, metadata, block_store, codec)?;
//! let md = engine.upload_object(params).await?;
//! let mut stream = engine.read_object_stream(read_params);
//! while let Some(buf) = stream.try_next().await? { /* ... */ }
//! ```

pub mod application;
pub mod infrastructure;

// Re-export the public engine surface
pub use application::engine::ObjectIoEngine;
pub use application::read::ReadParams;
pub use application::upload::{
    CopySource, MultipartParams, MultipartUpload, UploadParams, UploadSource,
};
pub use infrastructure::config::IoConfig;

// Re-export domain types for convenient access
pub use object_io_domain::{
    BlockStore, ByteRange, ChunkCodec, ChunkCoderConfig, ChunkSplitConfig, MetadataService,
    ObjectIoError, ObjectMd,
};
