// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Split Configuration
//!
//! Per-stream parameters of the content-defined splitter. The metadata
//! service hands one of these back from `create_object_upload`; the
//! defaults below apply when it leaves the choice to the client.
//!
//! The expected chunk size for random input is `min_chunk +
//! 2^avg_chunk_bits`, bounded above by `max_chunk`.

use serde::{Deserialize, Serialize};

use crate::error::ObjectIoError;

/// Splitter parameters for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSplitConfig {
    /// Smallest chunk the splitter will emit (except a short final chunk).
    pub min_chunk: u64,
    /// Largest chunk; a boundary is forced at this length.
    pub max_chunk: u64,
    /// Number of rolling-hash bits that must match for a content-defined
    /// boundary. Zero means every byte past `min_chunk` is a boundary.
    pub avg_chunk_bits: u32,
    /// Maintain a whole-stream MD5 (the object etag).
    pub calc_md5: bool,
    /// Maintain a whole-stream SHA-256.
    pub calc_sha256: bool,
}

impl ChunkSplitConfig {
    pub fn validate(&self) -> Result<(), ObjectIoError> {
        if self.min_chunk == 0 {
            return Err(ObjectIoError::InvalidConfiguration(
                "min_chunk must be positive".to_string(),
            ));
        }
        if self.min_chunk > self.max_chunk {
            return Err(ObjectIoError::InvalidConfiguration(format!(
                "min_chunk {} exceeds max_chunk {}",
                self.min_chunk, self.max_chunk
            )));
        }
        // The boundary mask is built as (1 << bits) - 1 in a 39-bit hash.
        if self.avg_chunk_bits >= 32 {
            return Err(ObjectIoError::InvalidConfiguration(format!(
                "avg_chunk_bits {} out of range",
                self.avg_chunk_bits
            )));
        }
        Ok(())
    }
}

impl Default for ChunkSplitConfig {
    fn default() -> Self {
        Self {
            min_chunk: 512 * 1024,
            max_chunk: 4 * 1024 * 1024,
            avg_chunk_bits: 20,
            calc_md5: true,
            calc_sha256: false,
        }
    }
}
