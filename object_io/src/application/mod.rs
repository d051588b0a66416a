// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! The engine's pipelines and facade:
//!
//! - [`engine`] - [`engine::ObjectIoEngine`], the public surface
//! - [`upload`] - the staged upload pipeline (splitter, encoder,
//!   coalescer, uploader) plus multipart and copy flows
//! - [`coalescer`] - the generic batch stage
//! - [`transfer_decoder`] - HTTP chunked-transfer envelope stripping
//! - [`map_client`] - the allocate / write / finalize batch state machine
//! - [`read`] - the cached, fragment-reconstructing read path

pub mod coalescer;
pub mod engine;
pub mod map_client;
pub mod read;
pub mod transfer_decoder;
pub mod upload;
