// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Codec
//!
//! The in-process reference implementation of the chunk codec contract.

pub mod stripe_codec;

pub use stripe_codec::StripeChunkCodec;
