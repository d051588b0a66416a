// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics
//!
//! Concurrency observability for the engine. Instance-scoped, not global.

pub mod concurrency_metrics;

pub use concurrency_metrics::ConcurrencyMetrics;
