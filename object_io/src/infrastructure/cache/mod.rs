// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Caching
//!
//! The aligned-range LRU cache backing the read path.

pub mod range_cache;

pub use range_cache::{CachedRange, RangeKey, RangeLruCache};
