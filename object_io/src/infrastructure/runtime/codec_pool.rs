// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Codec Worker Pool
//!
//! Async adapter over the synchronous [`ChunkCodec`] kernel. Encode and
//! decode are CPU-bound, so each call runs on the blocking thread pool via
//! `spawn_blocking`; a semaphore bounds how many run at once so a burst of
//! chunks cannot oversubscribe the CPU.
//!
//! Plaintext moves **into** `encode` by value and the coded result moves
//! out; nothing here retains a chunk buffer past the call.

use std::sync::Arc;
use tokio::sync::Semaphore;

use object_io_domain::entities::chunk_map::ChunkInfo;
use object_io_domain::services::chunk_codec::{ChunkCodec, EncodedChunk, RecoveredFragment};
use object_io_domain::value_objects::chunk_coder_config::ChunkCoderConfig;
use object_io_domain::ObjectIoError;

/// Bounded async front of the chunk codec.
pub struct CodecPool {
    codec: Arc<dyn ChunkCodec>,
    slots: Arc<Semaphore>,
}

impl CodecPool {
    pub fn new(codec: Arc<dyn ChunkCodec>, concurrency: usize) -> Self {
        Self {
            codec,
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Encodes one chunk on a worker thread. The plaintext buffer is
    /// consumed; callers keep only the coded output.
    pub async fn encode(
        &self,
        plaintext: Vec<u8>,
        config: ChunkCoderConfig,
    ) -> Result<EncodedChunk, ObjectIoError> {
        let _slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ObjectIoError::internal("codec pool closed"))?;
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || codec.encode(plaintext, &config))
            .await
            .map_err(|e| ObjectIoError::internal(format!("encode worker panicked: {}", e)))?
    }

    /// Decodes one chunk from recovered fragments on a worker thread.
    pub async fn decode(
        &self,
        chunk: ChunkInfo,
        frags: Vec<RecoveredFragment>,
    ) -> Result<Vec<u8>, ObjectIoError> {
        let _slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ObjectIoError::internal("codec pool closed"))?;
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || codec.decode(&chunk, frags))
            .await
            .map_err(|e| ObjectIoError::internal(format!("decode worker panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::codec::stripe_codec::StripeChunkCodec;

    #[tokio::test]
    async fn test_pool_round_trip() {
        let pool = CodecPool::new(Arc::new(StripeChunkCodec::new()), 4);
        let config = ChunkCoderConfig::default();
        let plaintext = vec![42u8; 10_000];

        let encoded = pool.encode(plaintext.clone(), config.clone()).await.unwrap();
        assert_eq!(encoded.size, plaintext.len() as u64);
        assert_eq!(encoded.frags.len() as u32, config.total_frags());
    }
}
