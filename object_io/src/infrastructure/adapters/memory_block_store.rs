// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Block Store
//!
//! A [`BlockStore`] keeping every block in a process-local map, with fault
//! injection hooks: whole agents can be failed for reads or writes, and
//! individual blocks can be tampered (first byte flipped) to exercise the
//! verification path.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use object_io_domain::entities::chunk_map::BlockMd;
use object_io_domain::services::block_store_service::BlockStore;
use object_io_domain::value_objects::ids::{BlockId, NodeId};
use object_io_domain::ObjectIoError;

#[derive(Default)]
struct StoreState {
    blocks: HashMap<BlockId, Bytes>,
    node_of: HashMap<BlockId, NodeId>,
    read_failing_nodes: HashSet<NodeId>,
    write_failing_nodes: HashSet<NodeId>,
    tampered: HashSet<BlockId>,
}

/// Block store over a process-local map, with fault injection.
#[derive(Default)]
pub struct MemoryBlockStore {
    state: Mutex<StoreState>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All subsequent reads from `node` fail with a transport error.
    pub fn fail_reads_on_node(&self, node: &NodeId) {
        self.state.lock().read_failing_nodes.insert(node.clone());
    }

    pub fn heal_node(&self, node: &NodeId) {
        let mut state = self.state.lock();
        state.read_failing_nodes.remove(node);
        state.write_failing_nodes.remove(node);
    }

    /// All subsequent writes to `node` fail with a transport error.
    pub fn fail_writes_on_node(&self, node: &NodeId) {
        self.state.lock().write_failing_nodes.insert(node.clone());
    }

    /// Reads of `block_id` return a payload with its first byte flipped.
    pub fn tamper_block(&self, block_id: BlockId) {
        self.state.lock().tampered.insert(block_id);
    }

    pub fn delete_block(&self, block_id: &BlockId) {
        let mut state = self.state.lock();
        state.blocks.remove(block_id);
        state.node_of.remove(block_id);
    }

    pub fn block_count(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn blocks_on_node(&self, node: &NodeId) -> Vec<BlockId> {
        self.state
            .lock()
            .node_of
            .iter()
            .filter(|(_, n)| *n == node)
            .map(|(b, _)| *b)
            .collect()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn read_block(&self, block: &BlockMd) -> Result<Bytes, ObjectIoError> {
        let state = self.state.lock();
        if state.read_failing_nodes.contains(&block.node_id) {
            return Err(ObjectIoError::BlockReadFailed(format!(
                "agent {} unreachable",
                block.node_id
            )));
        }
        let payload = state.blocks.get(&block.block_id).ok_or_else(|| {
            ObjectIoError::BlockReadFailed(format!(
                "block {} not found on {}",
                block.block_id, block.node_id
            ))
        })?;
        if state.tampered.contains(&block.block_id) {
            let mut forged = payload.to_vec();
            if let Some(first) = forged.first_mut() {
                *first ^= 0xff;
            }
            return Ok(Bytes::from(forged));
        }
        Ok(payload.clone())
    }

    async fn write_block(&self, block: &BlockMd, data: Bytes) -> Result<(), ObjectIoError> {
        let mut state = self.state.lock();
        if state.write_failing_nodes.contains(&block.node_id) {
            return Err(ObjectIoError::BlockWriteFailed(format!(
                "agent {} unreachable",
                block.node_id
            )));
        }
        state.node_of.insert(block.block_id, block.node_id.clone());
        state.blocks.insert(block.block_id, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_md(node: &str) -> BlockMd {
        BlockMd {
            block_id: BlockId::new(),
            node_id: NodeId::new(node),
            address: format!("mem://{}", node),
            digest: None,
        }
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let store = MemoryBlockStore::new();
        let block = block_md("n1");
        store
            .write_block(&block, Bytes::from_static(b"frame"))
            .await
            .unwrap();
        assert_eq!(
            store.read_block(&block).await.unwrap(),
            Bytes::from_static(b"frame")
        );
        assert_eq!(store.block_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_node_and_tamper() {
        let store = MemoryBlockStore::new();
        let block = block_md("n1");
        store
            .write_block(&block, Bytes::from_static(b"frame"))
            .await
            .unwrap();

        store.fail_reads_on_node(&block.node_id);
        assert!(matches!(
            store.read_block(&block).await,
            Err(ObjectIoError::BlockReadFailed(_))
        ));

        store.heal_node(&block.node_id);
        store.tamper_block(block.block_id);
        let forged = store.read_block(&block).await.unwrap();
        assert_ne!(forged, Bytes::from_static(b"frame"));
        assert_eq!(&forged[1..], b"rame");
    }
}
