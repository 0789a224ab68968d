//! Cart state manager.
//!
//! # Components
//!
//! - [`CartStore`] - Single source of truth for the current cart
//! - [`CartPersistence`] - Durable mirror under the [`keys::CART`](crate::storage::keys::CART) key
//! - [`Subscription`] - Disposal handle returned by [`CartStore::subscribe`]
//! - [`TotalsView`] - Reactive item count and total price
//!
//! Every mutation runs synchronously: the in-memory cart changes, a durable
//! write is attempted, then subscribers are notified.

mod observer;
mod persistence;
mod store;
mod totals;
pub mod wire;

pub use observer::{ObserverRegistry, Subscription};
pub use persistence::CartPersistence;
pub use store::{CartStore, MergeOutcome, WriteThrough};
pub use totals::TotalsView;

pub use mattys_media_core::{Cart, CartLine, CartTotals, LineKey};
