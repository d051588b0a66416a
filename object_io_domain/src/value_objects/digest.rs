// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Digest Value Object
//!
//! A digest value paired with the algorithm that produced it. Digests appear
//! at three levels of the data model: whole-stream digests (object MD5 /
//! SHA-256 etags), chunk content digests (the deduplication key), and
//! fragment/block digests (per-replica integrity). Equality compares both
//! the algorithm and the raw bytes, so an MD5 and a SHA-256 of the same
//! data never compare equal.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Digest algorithms the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    Md5,
    Sha256,
}

impl DigestKind {
    /// Digest length in bytes.
    pub fn len(&self) -> usize {
        match self {
            DigestKind::Md5 => 16,
            DigestKind::Sha256 => 32,
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestKind::Md5 => f.write_str("md5"),
            DigestKind::Sha256 => f.write_str("sha256"),
        }
    }
}

/// An algorithm-tagged digest value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    kind: DigestKind,
    #[serde(with = "hex::serde")]
    bytes: Vec<u8>,
}

impl Digest {
    /// Wraps raw digest bytes. The length must match the algorithm.
    pub fn new(kind: DigestKind, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), kind.len(), "digest length mismatch");
        Self { kind, bytes }
    }

    /// Digests `data` with the given algorithm.
    pub fn compute(kind: DigestKind, data: &[u8]) -> Self {
        match kind {
            DigestKind::Md5 => {
                let mut hasher = Md5::new();
                hasher.update(data);
                Self::new(kind, hasher.finalize().to_vec())
            }
            DigestKind::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(data);
                Self::new(kind, hasher.finalize().to_vec())
            }
        }
    }

    pub fn kind(&self) -> DigestKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex rendering, as stored in metadata records and etags.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.to_hex())
    }
}
