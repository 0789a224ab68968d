//! Durable mirror of the cart store.
//!
//! # Encoding
//!
//! The cart is stored as a JSON array of lines in cart order:
//!
//! ```json
//! [
//!   {"product_id":"p1","product_name":"Mug","quantity":2,"unit_price":"12.50"},
//!   {"product_id":"p2","product_name":"Shirt","quantity":1,"custom_text":"","unit_price":"20.00"}
//! ]
//! ```
//!
//! `custom_text` is omitted when absent and written (possibly empty) when
//! present. Arrays in the older browser layout (`price` as a number) are
//! still accepted on read.

use std::sync::Arc;

use mattys_media_core::{Cart, CartLine};
use serde::Deserialize;

use super::wire::WireLine;
use crate::error::PersistenceError;
use crate::storage::{KeyValueStore, keys};
use crate::telemetry::{Telemetry, TelemetryEvent};

/// Stored cart in any layout we know how to read.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCart {
    Current(Cart),
    Legacy(Vec<WireLine>),
}

/// Reads and writes the cart under a single storage key.
#[derive(Clone)]
pub struct CartPersistence {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    telemetry: Arc<dyn Telemetry>,
}

impl std::fmt::Debug for CartPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl CartPersistence {
    /// Mirror the cart under the default [`keys::CART`] key.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self::with_key(storage, keys::CART, telemetry)
    }

    /// Mirror the cart under a custom key.
    #[must_use]
    pub fn with_key(
        storage: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            telemetry,
        }
    }

    /// Storage key this adapter writes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize `cart` and store it.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if encoding or the storage write fails.
    pub fn write(&self, cart: &Cart) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_string(cart).map_err(PersistenceError::Encode)?;
        self.storage.set(&self.key, &encoded)?;
        Ok(())
    }

    /// Decode the stored cart.
    ///
    /// Returns `Ok(None)` when nothing has been stored.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Storage` if the read fails and
    /// `PersistenceError::Malformed` if the value cannot be decoded.
    pub fn load(&self) -> Result<Option<Cart>, PersistenceError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };
        let stored: StoredCart = serde_json::from_str(&raw).map_err(PersistenceError::Malformed)?;
        let cart = match stored {
            StoredCart::Current(cart) => cart,
            StoredCart::Legacy(lines) => lines
                .into_iter()
                .filter_map(|line| match CartLine::try_from(line) {
                    Ok(line) => Some(line),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping invalid line from stored cart");
                        None
                    }
                })
                .collect(),
        };
        Ok(Some(cart))
    }

    /// The previously stored cart, or `None`.
    ///
    /// Read and decode failures are reported to telemetry and treated as
    /// "nothing stored" so startup never halts on a bad value.
    #[must_use]
    pub fn read(&self) -> Option<Cart> {
        match self.load() {
            Ok(cart) => cart,
            Err(e) => {
                self.telemetry
                    .report(&TelemetryEvent::MalformedPersistedState {
                        error: e.to_string(),
                    });
                None
            }
        }
    }
}
