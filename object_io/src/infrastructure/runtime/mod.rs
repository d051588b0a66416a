// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime Governance
//!
//! The concurrency governors and the codec worker pool. All governors are
//! instance-scoped (owned by the engine, not process globals) so tests can
//! run isolated engines side by side.

pub mod codec_pool;
pub mod semaphores;

pub use codec_pool::CodecPool;
pub use semaphores::{ByteSemaphore, KeyedSemaphore, StressReporter};
