// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Store Port
//!
//! Async port to the storage agents that hold blocks. One call moves one
//! block payload; the agent is addressed by `block.address` and identified
//! by `block.node_id`. The engine wraps every call in its read/write
//! timeouts and concurrency governors - implementations only perform the
//! transfer. Authentication is outside this engine's scope; transports
//! that need a token attach it themselves.

use async_trait::async_trait;
use bytes::Bytes;

use crate::entities::chunk_map::BlockMd;
use crate::error::ObjectIoError;

/// Per-block transport to the storage agents.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Reads one block's payload from the agent holding it.
    async fn read_block(&self, block: &BlockMd) -> Result<Bytes, ObjectIoError>;

    /// Writes one block's payload to the agent allocated for it.
    async fn write_block(&self, block: &BlockMd, data: Bytes) -> Result<(), ObjectIoError>;
}
