// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Metadata Entity
//!
//! The authoritative metadata record of one object version, as returned by
//! `read_object_md` and `complete_object_upload`. The engine treats most
//! fields as opaque; the documented ones drive the read path (size, content
//! type) and the range cache's version check.
//!
//! ## Versioning
//!
//! Overwriting an object mints a new `obj_id` and `create_time`. The range
//! cache snapshots `(obj_id, etag, size, create_time)` with every loaded
//! buffer and refuses to serve the buffer once the authoritative record
//! stops matching - see [`ObjectMd::same_version`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::ids::ObjectId;

/// Authoritative metadata of one object version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMd {
    pub obj_id: ObjectId,
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
    /// Hex MD5 of the stream, quoted into the HTTP etag by the gateway.
    pub etag: String,
    pub create_time: DateTime<Utc>,
    /// Hex SHA-256 of the stream when the split config asked for one.
    pub sha256: Option<String>,
    pub num_parts: u64,
}

impl ObjectMd {
    /// True when `other` is the same version of the same object. This is
    /// the range cache's validation predicate: all four identity fields
    /// must match, not just the id.
    pub fn same_version(&self, other: &ObjectMd) -> bool {
        self.obj_id == other.obj_id
            && self.etag == other.etag
            && self.size == other.size
            && self.create_time == other.create_time
    }
}
