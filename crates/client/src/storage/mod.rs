//! Synchronous key-value storage.
//!
//! The cart and the session credential are persisted under well-known keys
//! in a small, synchronous key-value surface that survives restarts.
//!
//! # Backends
//!
//! - [`FileStore`] - One file per key inside a data directory
//! - [`MemoryStore`] - Process-local map, optionally with a byte quota
//!
//! # Keys
//!
//! See [`keys`]. The cart key is written only by the cart store.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Storage keys used by the storefront client.
pub mod keys {
    /// Key holding the canonical encoding of the current cart.
    pub const CART: &str = "cart";

    /// Key holding the current session credential (bearer token).
    pub const AUTH_TOKEN: &str = "auth_token";
}

/// Errors that can occur when reading or writing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed.
    #[error("storage I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the value would exceed the configured quota.
    #[error("storage quota exceeded writing {key} ({needed} bytes, {limit} allowed)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    /// The key contains characters the backend cannot store.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// A synchronous string key-value store.
///
/// Implementations must be cheap enough to call on every cart mutation.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
