// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Coder Configuration
//!
//! Describes how a chunk's plaintext becomes stored fragments: optional
//! compression, optional authenticated encryption, the fragment digest
//! algorithm, and the erasure layout (`data_frags` + `parity_frags` +
//! optional local-reconstruction fragments). The invariant the codec must
//! uphold: any `data_frags` fragments of a chunk suffice to reconstruct
//! the plaintext.

use serde::{Deserialize, Serialize};

use crate::error::ObjectIoError;
use crate::value_objects::digest::DigestKind;

/// Compression applied to chunk plaintext before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressType {
    Zstd,
}

/// Authenticated cipher applied per chunk with a fresh key and IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherType {
    Aes256Gcm,
}

/// Role of a fragment within a chunk's erasure layout.
///
/// The derived `Ord` gives the canonical fragment ordering
/// `(kind, index)`: all data fragments, then parity, then
/// local-reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Data,
    Parity,
    Lrc,
}

/// Coder parameters for one stream's chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCoderConfig {
    pub compress: Option<CompressType>,
    pub cipher: Option<CipherType>,
    /// Algorithm for the chunk content digest and fragment digests.
    pub frag_digest: DigestKind,
    pub data_frags: u32,
    pub parity_frags: u32,
    pub lrc_frags: u32,
}

impl ChunkCoderConfig {
    pub fn validate(&self) -> Result<(), ObjectIoError> {
        if self.data_frags == 0 {
            return Err(ObjectIoError::InvalidConfiguration(
                "data_frags must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Total fragments produced per chunk.
    pub fn total_frags(&self) -> u32 {
        self.data_frags + self.parity_frags + self.lrc_frags
    }
}

impl Default for ChunkCoderConfig {
    fn default() -> Self {
        Self {
            compress: Some(CompressType::Zstd),
            cipher: Some(CipherType::Aes256Gcm),
            frag_digest: DigestKind::Sha256,
            data_frags: 4,
            parity_frags: 2,
            lrc_frags: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_kind_ordering() {
        assert!(FragmentKind::Data < FragmentKind::Parity);
        assert!(FragmentKind::Parity < FragmentKind::Lrc);
    }

    #[test]
    fn test_validate_rejects_zero_data_frags() {
        let config = ChunkCoderConfig {
            data_frags: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_total_frags() {
        let config = ChunkCoderConfig::default();
        assert_eq!(config.total_frags(), 6);
    }
}
