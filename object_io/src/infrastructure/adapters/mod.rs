// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Adapters
//!
//! In-memory implementations of the two external service ports. They back
//! the integration tests and give embedders a zero-dependency playground;
//! production deployments implement the ports over their RPC transports.

pub mod memory_block_store;
pub mod memory_metadata;

pub use memory_block_store::MemoryBlockStore;
pub use memory_metadata::MemoryMetadataService;
