// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stripe Chunk Codec
//!
//! Reference implementation of [`ChunkCodec`]: zstd compression, AES-256-GCM
//! encryption with a fresh key and IV per chunk, SHA-256/MD5 digests, and a
//! striping erasure layout with XOR parity.
//!
//! ## Encoding pipeline
//!
//! ```text
//! plaintext ──digest──> content_digest
//!           ──zstd───> frame ──aes-gcm──> cipher frame (+16-byte tag)
//!           ──stripe──> data fragments (k equal stripes, zero padded)
//!           ──xor─────> parity fragments, LRC group fragments
//! ```
//!
//! ## Erasure capability
//!
//! XOR parity recovers one missing data stripe per parity set; an LRC
//! fragment recovers one missing stripe within its group. This is a
//! single-erasure code - production deployments substitute a
//! Reed-Solomon kernel behind the same contract, which is why the engine
//! never assumes more than "any `data_frags` fragments suffice".

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use bytes::Bytes;
use std::collections::HashMap;

use object_io_domain::entities::chunk_map::ChunkInfo;
use object_io_domain::services::chunk_codec::{
    ChunkCodec, EncodedChunk, EncodedFragment, RecoveredFragment,
};
use object_io_domain::value_objects::chunk_coder_config::{
    ChunkCoderConfig, CipherType, CompressType, FragmentKind,
};
use object_io_domain::value_objects::digest::Digest;
use object_io_domain::ObjectIoError;

/// zstd level for chunk frames; chunk payloads favor speed over ratio.
const ZSTD_LEVEL: i32 = 1;

/// AES-GCM authentication tag length appended to the cipher frame.
const GCM_TAG_LEN: usize = 16;

fn xor_into(acc: &mut [u8], other: &[u8]) {
    debug_assert_eq!(acc.len(), other.len());
    for (a, b) in acc.iter_mut().zip(other) {
        *a ^= b;
    }
}

/// Striping codec with XOR parity. Stateless; share one instance.
#[derive(Debug, Default)]
pub struct StripeChunkCodec;

impl StripeChunkCodec {
    pub fn new() -> Self {
        Self
    }

    /// Cipher frame length for a chunk: compressed frame plus GCM tag.
    fn frame_len(chunk: &ChunkInfo) -> usize {
        let mut len = chunk.compressed_size as usize;
        if chunk.coder.cipher.is_some() {
            len += GCM_TAG_LEN;
        }
        len
    }

    fn stripe_size(frame_len: usize, data_frags: usize) -> usize {
        frame_len.div_ceil(data_frags).max(1)
    }

    /// LRC group of a data stripe index: `data_frags` stripes split into
    /// `lrc_frags` contiguous groups.
    fn lrc_group(index: usize, data_frags: usize, lrc_frags: usize) -> usize {
        let group_size = data_frags.div_ceil(lrc_frags);
        index / group_size
    }
}

impl ChunkCodec for StripeChunkCodec {
    fn encode(
        &self,
        plaintext: Vec<u8>,
        config: &ChunkCoderConfig,
    ) -> Result<EncodedChunk, ObjectIoError> {
        config.validate()?;
        if plaintext.is_empty() {
            return Err(ObjectIoError::InvalidChunk(
                "cannot encode an empty chunk".to_string(),
            ));
        }

        let size = plaintext.len() as u64;
        let content_digest = Digest::compute(config.frag_digest, &plaintext);

        let frame = match config.compress {
            Some(CompressType::Zstd) => zstd::bulk::compress(&plaintext, ZSTD_LEVEL)
                .map_err(|e| ObjectIoError::codec(format!("zstd compress: {}", e)))?,
            None => plaintext,
        };
        let compressed_size = frame.len() as u64;

        let (frame, cipher_key, cipher_iv) = match config.cipher {
            Some(CipherType::Aes256Gcm) => {
                let key = Aes256Gcm::generate_key(&mut OsRng);
                let iv = Aes256Gcm::generate_nonce(&mut OsRng);
                let cipher = Aes256Gcm::new(&key);
                let sealed = cipher
                    .encrypt(&iv, frame.as_slice())
                    .map_err(|_| ObjectIoError::codec("aes-gcm seal failed"))?;
                (sealed, key.to_vec(), iv.to_vec())
            }
            None => (frame, Vec::new(), Vec::new()),
        };

        let data_frags = config.data_frags as usize;
        let stripe_size = Self::stripe_size(frame.len(), data_frags);
        let mut padded = frame;
        padded.resize(data_frags * stripe_size, 0);

        let stripes: Vec<&[u8]> = padded.chunks(stripe_size).collect();

        let mut frags = Vec::with_capacity(config.total_frags() as usize);
        for (index, stripe) in stripes.iter().enumerate() {
            frags.push(EncodedFragment {
                kind: FragmentKind::Data,
                index: index as u32,
                digest: Some(Digest::compute(config.frag_digest, stripe)),
                frame: Bytes::copy_from_slice(stripe),
            });
        }

        if config.parity_frags > 0 {
            let mut parity = vec![0u8; stripe_size];
            for stripe in &stripes {
                xor_into(&mut parity, stripe);
            }
            let parity = Bytes::from(parity);
            for index in 0..config.parity_frags {
                frags.push(EncodedFragment {
                    kind: FragmentKind::Parity,
                    index,
                    digest: Some(Digest::compute(config.frag_digest, &parity)),
                    frame: parity.clone(),
                });
            }
        }

        if config.lrc_frags > 0 {
            let lrc_frags = config.lrc_frags as usize;
            let mut groups = vec![vec![0u8; stripe_size]; lrc_frags];
            for (index, stripe) in stripes.iter().enumerate() {
                let group = Self::lrc_group(index, data_frags, lrc_frags);
                xor_into(&mut groups[group], stripe);
            }
            for (index, group) in groups.into_iter().enumerate() {
                let frame = Bytes::from(group);
                frags.push(EncodedFragment {
                    kind: FragmentKind::Lrc,
                    index: index as u32,
                    digest: Some(Digest::compute(config.frag_digest, &frame)),
                    frame,
                });
            }
        }

        Ok(EncodedChunk {
            size,
            compressed_size,
            content_digest,
            cipher_key,
            cipher_iv,
            frags,
        })
    }

    fn decode(
        &self,
        chunk: &ChunkInfo,
        frags: Vec<RecoveredFragment>,
    ) -> Result<Vec<u8>, ObjectIoError> {
        let config = &chunk.coder;
        config.validate()?;
        let data_frags = config.data_frags as usize;
        let frame_len = Self::frame_len(chunk);
        let stripe_size = Self::stripe_size(frame_len, data_frags);

        let mut data: HashMap<usize, Bytes> = HashMap::new();
        let mut parity: Option<Bytes> = None;
        let mut lrc: HashMap<usize, Bytes> = HashMap::new();
        for frag in frags {
            if frag.frame.len() != stripe_size {
                // wrong-sized frame cannot participate in stripe math
                continue;
            }
            match frag.kind {
                FragmentKind::Data => {
                    data.entry(frag.index as usize).or_insert(frag.frame);
                }
                FragmentKind::Parity => {
                    parity.get_or_insert(frag.frame);
                }
                FragmentKind::Lrc => {
                    lrc.entry(frag.index as usize).or_insert(frag.frame);
                }
            }
        }

        let missing: Vec<usize> = (0..data_frags).filter(|i| !data.contains_key(i)).collect();

        match (missing.as_slice(), &parity) {
            ([], _) => {}
            ([lost], Some(parity_frame)) => {
                // parity = xor of all data stripes
                let mut rebuilt = parity_frame.to_vec();
                for stripe in data.values() {
                    xor_into(&mut rebuilt, stripe);
                }
                data.insert(*lost, Bytes::from(rebuilt));
            }
            _ if config.lrc_frags > 0 => {
                let lrc_frags = config.lrc_frags as usize;
                for &lost in &missing {
                    let group = Self::lrc_group(lost, data_frags, lrc_frags);
                    let siblings: Vec<usize> = (0..data_frags)
                        .filter(|&i| i != lost && Self::lrc_group(i, data_frags, lrc_frags) == group)
                        .collect();
                    let group_complete = siblings.iter().all(|i| data.contains_key(i));
                    if let (true, Some(lrc_frame)) = (group_complete, lrc.get(&group)) {
                        let mut rebuilt = lrc_frame.to_vec();
                        for i in &siblings {
                            xor_into(&mut rebuilt, &data[i]);
                        }
                        data.insert(lost, Bytes::from(rebuilt));
                    }
                }
                if data.len() < data_frags {
                    return Err(ObjectIoError::Reconstruction(format!(
                        "chunk {}: {} of {} data fragments recovered",
                        chunk.chunk_id,
                        data.len(),
                        data_frags
                    )));
                }
            }
            _ => {
                return Err(ObjectIoError::Reconstruction(format!(
                    "chunk {}: {} data fragments missing, parity can rebuild one",
                    chunk.chunk_id,
                    missing.len()
                )));
            }
        }

        let mut frame = Vec::with_capacity(data_frags * stripe_size);
        for index in 0..data_frags {
            frame.extend_from_slice(&data[&index]);
        }
        frame.truncate(frame_len);

        let frame = match config.cipher {
            Some(CipherType::Aes256Gcm) => {
                if chunk.cipher_key.len() != 32 || chunk.cipher_iv.len() != 12 {
                    return Err(ObjectIoError::codec(format!(
                        "chunk {}: malformed cipher key/iv",
                        chunk.chunk_id
                    )));
                }
                let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&chunk.cipher_key));
                cipher
                    .decrypt(Nonce::from_slice(&chunk.cipher_iv), frame.as_slice())
                    .map_err(|_| ObjectIoError::codec("aes-gcm open failed"))?
            }
            None => frame,
        };

        let plaintext = match config.compress {
            Some(CompressType::Zstd) => zstd::bulk::decompress(&frame, chunk.size as usize)
                .map_err(|e| ObjectIoError::codec(format!("zstd decompress: {}", e)))?,
            None => frame,
        };

        if plaintext.len() as u64 != chunk.size {
            return Err(ObjectIoError::integrity(format!(
                "chunk {}: decoded {} bytes, expected {}",
                chunk.chunk_id,
                plaintext.len(),
                chunk.size
            )));
        }
        if Digest::compute(chunk.content_digest.kind(), &plaintext) != chunk.content_digest {
            return Err(ObjectIoError::integrity(format!(
                "chunk {}: content digest mismatch after decode",
                chunk.chunk_id
            )));
        }
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_io_domain::value_objects::ids::ChunkId;

    fn chunk_info(encoded: &EncodedChunk, config: &ChunkCoderConfig) -> ChunkInfo {
        ChunkInfo {
            chunk_id: ChunkId::new(),
            size: encoded.size,
            compressed_size: encoded.compressed_size,
            content_digest: encoded.content_digest.clone(),
            coder: config.clone(),
            cipher_key: encoded.cipher_key.clone(),
            cipher_iv: encoded.cipher_iv.clone(),
            frags: Vec::new(),
        }
    }

    fn recovered(encoded: &EncodedChunk, keep: impl Fn(&EncodedFragment) -> bool) -> Vec<RecoveredFragment> {
        encoded
            .frags
            .iter()
            .filter(|f| keep(f))
            .map(|f| RecoveredFragment {
                kind: f.kind,
                index: f.index,
                frame: f.frame.clone(),
            })
            .collect()
    }

    fn test_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_round_trip_plain() {
        let codec = StripeChunkCodec::new();
        let config = ChunkCoderConfig {
            compress: None,
            cipher: None,
            ..Default::default()
        };
        let payload = test_payload(10_000);
        let encoded = codec.encode(payload.clone(), &config).unwrap();
        assert_eq!(encoded.compressed_size, payload.len() as u64);

        let chunk = chunk_info(&encoded, &config);
        let decoded = codec
            .decode(&chunk, recovered(&encoded, |f| f.kind == FragmentKind::Data))
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_round_trip_compressed_encrypted() {
        let codec = StripeChunkCodec::new();
        let config = ChunkCoderConfig::default();
        let payload = test_payload(50_000);
        let encoded = codec.encode(payload.clone(), &config).unwrap();
        assert_eq!(encoded.cipher_key.len(), 32);
        assert_eq!(encoded.cipher_iv.len(), 12);
        // repeating payload compresses
        assert!(encoded.compressed_size < payload.len() as u64);

        let chunk = chunk_info(&encoded, &config);
        let decoded = codec
            .decode(&chunk, recovered(&encoded, |f| f.kind == FragmentKind::Data))
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_fragment_ordering_and_digests() {
        let codec = StripeChunkCodec::new();
        let config = ChunkCoderConfig {
            lrc_frags: 2,
            ..Default::default()
        };
        let encoded = codec.encode(test_payload(9_999), &config).unwrap();
        assert_eq!(encoded.frags.len() as u32, config.total_frags());

        // ordered by (kind, index)
        let order: Vec<(FragmentKind, u32)> =
            encoded.frags.iter().map(|f| (f.kind, f.index)).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);

        for frag in &encoded.frags {
            let digest = frag.digest.as_ref().unwrap();
            assert_eq!(digest, &Digest::compute(config.frag_digest, &frag.frame));
        }
    }

    #[test]
    fn test_parity_recovers_one_missing_stripe() {
        let codec = StripeChunkCodec::new();
        let config = ChunkCoderConfig::default();
        let payload = test_payload(30_000);
        let encoded = codec.encode(payload.clone(), &config).unwrap();
        let chunk = chunk_info(&encoded, &config);

        // drop data stripe 2, keep parity
        let frags = recovered(&encoded, |f| {
            !(f.kind == FragmentKind::Data && f.index == 2)
        });
        let decoded = codec.decode(&chunk, frags).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_lrc_recovers_within_group() {
        let codec = StripeChunkCodec::new();
        let config = ChunkCoderConfig {
            parity_frags: 0,
            lrc_frags: 2,
            ..Default::default()
        };
        let payload = test_payload(30_000);
        let encoded = codec.encode(payload.clone(), &config).unwrap();
        let chunk = chunk_info(&encoded, &config);

        // groups are {0,1} and {2,3}: lose one stripe of each group
        let frags = recovered(&encoded, |f| {
            !(f.kind == FragmentKind::Data && (f.index == 0 || f.index == 3))
        });
        let decoded = codec.decode(&chunk, frags).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_too_many_erasures_fail() {
        let codec = StripeChunkCodec::new();
        let config = ChunkCoderConfig::default();
        let encoded = codec.encode(test_payload(30_000), &config).unwrap();
        let chunk = chunk_info(&encoded, &config);

        // two data stripes lost, single XOR parity cannot recover
        let frags = recovered(&encoded, |f| {
            !(f.kind == FragmentKind::Data && (f.index == 0 || f.index == 1))
        });
        let result = codec.decode(&chunk, frags);
        assert!(matches!(result, Err(ObjectIoError::Reconstruction(_))));
    }

    #[test]
    fn test_tampered_frame_fails_closed() {
        let codec = StripeChunkCodec::new();
        let config = ChunkCoderConfig::default();
        let encoded = codec.encode(test_payload(30_000), &config).unwrap();
        let chunk = chunk_info(&encoded, &config);

        let mut frags = recovered(&encoded, |f| f.kind == FragmentKind::Data);
        let mut corrupted = frags[0].frame.to_vec();
        corrupted[0] ^= 0xff;
        frags[0].frame = Bytes::from(corrupted);

        // the GCM tag refuses the forged frame
        assert!(codec.decode(&chunk, frags).is_err());
    }

    #[test]
    fn test_rejects_empty_chunk() {
        let codec = StripeChunkCodec::new();
        assert!(codec
            .encode(Vec::new(), &ChunkCoderConfig::default())
            .is_err());
    }
}
