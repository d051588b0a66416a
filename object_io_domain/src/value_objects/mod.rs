// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Value Objects
//!
//! Immutable, self-validating objects defined by their attributes:
//!
//! - [`ids`] - type-safe identifiers for objects, multiparts, chunks,
//!   parts, blocks, and storage nodes
//! - [`Digest`] / [`DigestKind`] - digest values with their algorithm
//! - [`ByteRange`] - half-open `[start, end)` ranges with alignment helpers
//! - [`ChunkSplitConfig`] - per-stream splitter parameters
//! - [`ChunkCoderConfig`] - compression / cipher / erasure layout of chunks
//! - [`FragmentKind`] - data, parity, or local-reconstruction

pub mod byte_range;
pub mod chunk_coder_config;
pub mod chunk_split_config;
pub mod digest;
pub mod ids;

pub use byte_range::ByteRange;
pub use chunk_coder_config::{ChunkCoderConfig, CipherType, CompressType, FragmentKind};
pub use chunk_split_config::ChunkSplitConfig;
pub use digest::{Digest, DigestKind};
