// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the single error type shared by the whole workspace.
//! The taxonomy mirrors the failure domains of the I/O engine:
//!
//! - **Admission** - `StreamItemTimeout`: the byte-admission semaphore timed
//!   out before a stream could reserve memory.
//! - **Transport** - `BlockReadFailed` / `BlockWriteFailed`: a single block
//!   operation against one agent failed. Transport failures are tolerated
//!   per replica; they escalate to `Reconstruction` only when a fragment
//!   cannot be obtained from any replica.
//! - **Reconstruction** - too few fragments remain to decode a chunk. Fatal
//!   for the read request.
//! - **Tampering** - a block digest recomputed in verification mode did not
//!   match the stored digest.
//! - **Integrity** - assembled range does not cover or match the requested
//!   window; indicates a metadata or engine bug, never a transient fault.
//! - **UploadMap** - the allocate/write/finalize batch reported a fatal
//!   error; the upload pipeline aborts.
//! - **Rpc** - a metadata-service call failed; propagated unchanged.
//!
//! ## Propagation
//!
//! All errors propagate to the pipeline coordinator, which performs
//! best-effort cleanup (abort RPC for uploads, close for reads) and
//! re-raises the **original** error. Error-report RPCs must never replace
//! the error that triggered them.

use thiserror::Error;

/// Domain-specific errors for the object I/O engine.
///
/// Each variant carries a descriptive message; variants map one-to-one onto
/// the engine's failure domains so callers can match on the failure class
/// without parsing strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectIoError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// Memory-admission semaphore timed out (`STREAM_ITEM_TIMEOUT`).
    #[error("Stream item timeout: {0}")]
    StreamItemTimeout(String),

    #[error("Block read failed: {0}")]
    BlockReadFailed(String),

    #[error("Block write failed: {0}")]
    BlockWriteFailed(String),

    /// Insufficient fragments to decode a chunk.
    #[error("Reconstruction failed: {0}")]
    Reconstruction(String),

    /// Verification mode only: stored digest does not match block payload.
    #[error("Tampering detected: {0}")]
    Tampering(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Fatal batch error from the allocate/write/finalize state machine.
    #[error("Upload mapping failed: {0}")]
    UploadMap(String),

    /// Metadata-service RPC failure, propagated unchanged.
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ObjectIoError {
    /// Creates a cancellation error with a default message
    pub fn cancelled() -> Self {
        ObjectIoError::Cancelled("operation cancelled".to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ObjectIoError::InternalError(msg.into())
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        ObjectIoError::Rpc(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        ObjectIoError::Codec(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        ObjectIoError::Integrity(msg.into())
    }

    /// True for the failure classes that a retry against another replica
    /// may resolve. `Reconstruction` and `Integrity` are final.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ObjectIoError::BlockReadFailed(_)
                | ObjectIoError::BlockWriteFailed(_)
                | ObjectIoError::TimeoutError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ObjectIoError::StreamItemTimeout("upload of 4 MiB".to_string());
        assert_eq!(err.to_string(), "Stream item timeout: upload of 4 MiB");

        let err = ObjectIoError::Tampering("block 7 on node-1".to_string());
        assert!(err.to_string().contains("Tampering"));
    }

    #[test]
    fn test_transport_classification() {
        assert!(ObjectIoError::BlockReadFailed("x".into()).is_transport());
        assert!(ObjectIoError::TimeoutError("x".into()).is_transport());
        assert!(!ObjectIoError::Reconstruction("x".into()).is_transport());
        assert!(!ObjectIoError::Integrity("x".into()).is_transport());
    }
}
