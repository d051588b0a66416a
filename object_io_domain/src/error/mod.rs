// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error Module
//!
//! Error types for the object I/O domain. See [`ObjectIoError`] for the
//! taxonomy and propagation rules.

pub mod object_io_error;

pub use object_io_error::ObjectIoError;
