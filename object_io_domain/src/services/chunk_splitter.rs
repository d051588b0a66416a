// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content-Defined Chunk Splitter
//!
//! Single-pass stream splitter producing deterministic, content-defined
//! chunk boundaries plus whole-stream digests. Boundaries depend only on
//! the bytes inside a fixed 16-byte window, so insertions and deletions
//! shift boundaries locally instead of re-chunking the rest of the stream -
//! the property deduplication rests on.
//!
//! ## Rolling hash
//!
//! A Rabin fingerprint over GF(2): the window bytes are treated as a
//! polynomial and reduced modulo a fixed irreducible polynomial of degree
//! 39. Shift-in and shift-out are both one table lookup plus a couple of
//! xors; the two 256-entry tables are derived from the polynomial once per
//! process (see [`RabinTables`]).
//!
//! ## Boundary rule
//!
//! A boundary is declared at position `p` of the current chunk when
//! `p >= min_chunk` and either the low `avg_chunk_bits` bits of the hash
//! are all ones, or `p == max_chunk`. Expected chunk size for random input
//! is therefore `min_chunk + 2^avg_chunk_bits`, capped at `max_chunk`.
//!
//! On every boundary the window and hash are reset to zero, making chunk
//! boundaries independent of preceding chunks.
//!
//! ## Skip band
//!
//! Bytes below `min_chunk - WINDOW` are skipped without hashing - no
//! boundary may fall there, so the hash values would be discarded anyway.
//! The final `WINDOW` bytes before `min_chunk` are rolled in so the
//! boundary predicate is evaluable from `min_chunk` onward.
//!
//! ## Finish semantics
//!
//! [`ChunkSplitter::finish`] emits no trailing boundary: residual bytes are
//! returned as the final chunk (possibly shorter than `min_chunk`), and the
//! stream digests are finalized. An empty stream yields no final chunk.
//!
//! The inner loop touches only stack-resident state (hash, window, bounds);
//! the window array and digest contexts live for the stream's lifetime.

use md5::Md5;
use sha2::{Digest as _, Sha256};
use std::sync::LazyLock;

use crate::error::ObjectIoError;
use crate::value_objects::chunk_split_config::ChunkSplitConfig;
use crate::value_objects::digest::{Digest, DigestKind};

/// Degree of the irreducible GF(2) polynomial.
const RABIN_DEGREE: u32 = 39;

/// `x^39 + x^29 + x^20 + x^16 + x^12 + x^11 + x^9 + x^6 + x^3 + x + 1`,
/// irreducible over GF(2).
const RABIN_POLY: u64 = 0x80_2011_1A4B;

/// Rolling window length in bytes. Power of two so the window cursor wraps
/// with a mask.
const RABIN_WINDOW: usize = 16;

/// Low 39 bits - the fingerprint domain.
const FINGERPRINT_MASK: u64 = (1 << RABIN_DEGREE) - 1;

/// Precomputed shift tables of the Rabin fingerprint.
///
/// `shift_in[b] = (b * x^39) mod P` reduces the byte that overflows the
/// fingerprint when eight new bits enter. `shift_out[b] = (b * x^120) mod P`
/// cancels the byte leaving the 16-byte window. Both tables are read-only
/// after construction and shared process-wide.
struct RabinTables {
    shift_in: [u64; 256],
    shift_out: [u64; 256],
}

static RABIN_TABLES: LazyLock<RabinTables> = LazyLock::new(RabinTables::build);

/// Degree of a GF(2) polynomial, `deg(0)` defined as 0 for our uses.
fn poly_degree(p: u64) -> u32 {
    63 - p.leading_zeros()
}

/// `a mod m` over GF(2).
fn poly_mod(mut a: u64, m: u64) -> u64 {
    let md = poly_degree(m);
    while a != 0 && poly_degree(a) >= md {
        a ^= m << (poly_degree(a) - md);
    }
    a
}

/// `(a * b) mod m` over GF(2), operands already reduced below `m`.
fn poly_mulmod(mut a: u64, mut b: u64, m: u64) -> u64 {
    let md = poly_degree(m);
    let mut r = 0u64;
    while b != 0 {
        if b & 1 != 0 {
            r ^= a;
        }
        b >>= 1;
        a <<= 1;
        if poly_degree(a) >= md {
            a ^= m;
        }
    }
    r
}

impl RabinTables {
    fn build() -> Self {
        let mut shift_in = [0u64; 256];
        for (b, entry) in shift_in.iter_mut().enumerate() {
            *entry = poly_mod((b as u64) << RABIN_DEGREE, RABIN_POLY);
        }

        // x^(8 * (WINDOW - 1)) mod P: the weight of the window's oldest byte.
        let mut x_pow = 1u64;
        for _ in 0..RABIN_WINDOW - 1 {
            x_pow = poly_mod(x_pow << 8, RABIN_POLY);
        }
        let mut shift_out = [0u64; 256];
        for (b, entry) in shift_out.iter_mut().enumerate() {
            *entry = poly_mulmod(b as u64, x_pow, RABIN_POLY);
        }

        Self {
            shift_in,
            shift_out,
        }
    }

    /// Shifts eight bits into the fingerprint.
    #[inline(always)]
    fn append(&self, hash: u64, byte: u8) -> u64 {
        let top = (hash >> (RABIN_DEGREE - 8)) as usize;
        (((hash << 8) | byte as u64) & FINGERPRINT_MASK) ^ self.shift_in[top]
    }
}

/// Finalized whole-stream digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigests {
    pub md5: Option<Digest>,
    pub sha256: Option<Digest>,
}

/// Single-stream content-defined splitter. Feed with [`push`](Self::push),
/// close with [`finish`](Self::finish). A splitter analyzes exactly one
/// stream; create a new instance per stream.
pub struct ChunkSplitter {
    config: ChunkSplitConfig,
    boundary_mask: u64,
    /// Bytes of the current chunk below this offset bypass the hash.
    skip_len: u64,
    hash: u64,
    window: [u8; RABIN_WINDOW],
    window_pos: usize,
    /// Bytes consumed into the current chunk so far.
    chunk_pos: u64,
    /// Bytes of the current (incomplete) chunk.
    pending: Vec<u8>,
    md5: Option<Md5>,
    sha256: Option<Sha256>,
}

impl ChunkSplitter {
    pub fn new(config: ChunkSplitConfig) -> Result<Self, ObjectIoError> {
        config.validate()?;
        Ok(Self {
            boundary_mask: (1u64 << config.avg_chunk_bits) - 1,
            skip_len: config.min_chunk.saturating_sub(RABIN_WINDOW as u64),
            hash: 0,
            window: [0; RABIN_WINDOW],
            window_pos: 0,
            chunk_pos: 0,
            pending: Vec::new(),
            md5: config.calc_md5.then(Md5::new),
            sha256: config.calc_sha256.then(Sha256::new),
            config,
        })
    }

    /// Consumes the whole buffer, returning every chunk completed by it.
    ///
    /// Boundaries are independent of how the stream is fragmented across
    /// `push` calls; an empty push is a no-op. Stream digests are updated
    /// over the raw bytes regardless of boundaries.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        if data.is_empty() {
            return Vec::new();
        }
        if let Some(md5) = &mut self.md5 {
            md5.update(data);
        }
        if let Some(sha256) = &mut self.sha256 {
            sha256.update(data);
        }

        let tables: &RabinTables = &RABIN_TABLES;
        let min_chunk = self.config.min_chunk;
        let max_chunk = self.config.max_chunk;
        let boundary_mask = self.boundary_mask;
        let skip_len = self.skip_len;

        // Hot state lives in locals for the scan; stored back on exit.
        let mut hash = self.hash;
        let mut window_pos = self.window_pos;
        let mut chunk_pos = self.chunk_pos;

        let mut chunks = Vec::new();
        let mut chunk_start = 0usize;
        let mut i = 0usize;

        while i < data.len() {
            if chunk_pos < skip_len {
                // No boundary can fall in the skip band; jump over it.
                let take = ((skip_len - chunk_pos) as usize).min(data.len() - i);
                chunk_pos += take as u64;
                i += take;
                continue;
            }

            let byte = data[i];
            let outgoing = self.window[window_pos];
            self.window[window_pos] = byte;
            window_pos = (window_pos + 1) & (RABIN_WINDOW - 1);
            hash = tables.append(hash ^ tables.shift_out[outgoing as usize], byte);
            chunk_pos += 1;
            i += 1;

            if chunk_pos >= min_chunk
                && ((hash & boundary_mask) == boundary_mask || chunk_pos >= max_chunk)
            {
                let mut chunk = std::mem::take(&mut self.pending);
                chunk.extend_from_slice(&data[chunk_start..i]);
                chunks.push(chunk);
                chunk_start = i;
                chunk_pos = 0;
                hash = 0;
                self.window = [0; RABIN_WINDOW];
                window_pos = 0;
            }
        }

        self.pending.extend_from_slice(&data[chunk_start..]);
        self.hash = hash;
        self.window_pos = window_pos;
        self.chunk_pos = chunk_pos;
        chunks
    }

    /// Closes the stream. Residual bytes form the final chunk (`None` for
    /// an empty residue); no trailing boundary is emitted. Digests are
    /// finalized for the algorithms the config enabled.
    pub fn finish(self) -> (Option<Vec<u8>>, StreamDigests) {
        let residue = if self.pending.is_empty() {
            None
        } else {
            Some(self.pending)
        };
        let digests = StreamDigests {
            md5: self
                .md5
                .map(|md5| Digest::new(DigestKind::Md5, md5.finalize().to_vec())),
            sha256: self
                .sha256
                .map(|sha| Digest::new(DigestKind::Sha256, sha.finalize().to_vec())),
        };
        (residue, digests)
    }
}
