// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entities
//!
//! Records with identity, exchanged with the metadata service:
//!
//! - [`ObjectMd`] - a logical object's authoritative metadata
//! - [`ChunkInfo`], [`FragmentMd`], [`BlockMd`], [`PartMd`] - the mapping
//!   tree binding object ranges to stored blocks

pub mod chunk_map;
pub mod object_md;

pub use chunk_map::{BlockMd, ChunkInfo, FragmentMd, PartInfo, PartMd};
pub use object_md::ObjectMd;
