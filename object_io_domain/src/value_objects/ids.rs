// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Typed Identifiers
//!
//! Newtype identifiers for every record kind the engine exchanges with the
//! metadata service. Wrapping `Uuid` keeps object ids, chunk ids, and block
//! ids from being confused at compile time; the metadata service is the only
//! party that mints them (via [`new`](ObjectId::new) on its side of the
//! port).
//!
//! `NodeId` is a string name rather than a UUID: agent identities come from
//! cluster membership and are used as semaphore keys, log fields, and
//! routing hints.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Mints a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identity of a logical object.
    ObjectId
);
uuid_id!(
    /// Identity of one multipart upload of an object.
    MultipartId
);
uuid_id!(
    /// Identity of a deduplicated chunk record.
    ChunkId
);
uuid_id!(
    /// Identity of a part record placing a chunk into an object range.
    PartId
);
uuid_id!(
    /// Identity of one stored replica of one fragment.
    BlockId
);

/// Identity of a storage agent. Used as the key of the per-agent read
/// semaphore and in block addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
