//! Error types for the cart state manager.
//!
//! Business-logic errors ([`CartError`]) are returned to the caller. I/O
//! errors ([`PersistenceError`], [`RemoteError`](crate::reconcile::RemoteError))
//! are contained in the subsystem and surfaced through
//! [`Telemetry`](crate::telemetry::Telemetry) and result values.

use mattys_media_core::OutOfRange;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by cart store mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartError {
    /// A mutation referenced a line position that does not exist.
    #[error("line {index} is out of range (cart has {len} lines)")]
    OutOfRange { index: usize, len: usize },
}

impl From<OutOfRange> for CartError {
    fn from(err: OutOfRange) -> Self {
        Self::OutOfRange {
            index: err.index,
            len: err.len,
        }
    }
}

/// Errors from the durable cart mirror.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The key-value store rejected the read or write.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cart could not be encoded.
    #[error("failed to encode cart: {0}")]
    Encode(#[source] serde_json::Error),

    /// The stored value is not a valid cart encoding.
    #[error("malformed persisted cart: {0}")]
    Malformed(#[source] serde_json::Error),
}
