// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Services
//!
//! Stateless algorithms and the ports to external collaborators:
//!
//! - [`chunk_splitter`] - the content-defined rolling-hash splitter (sync,
//!   CPU-bound)
//! - [`chunk_codec`] - the encode/decode kernel contract (sync, CPU-bound;
//!   the engine runs it on a bounded worker pool)
//! - [`metadata_service`] - async port to the metadata service RPCs
//! - [`block_store_service`] - async port to the block-store agents
//!
//! Domain services that are CPU-bound stay synchronous; async execution is
//! an engine concern. The two ports are async traits because they model
//! network I/O.

pub mod block_store_service;
pub mod chunk_codec;
pub mod chunk_splitter;
pub mod metadata_service;
