//! The cart store: single source of truth for the current cart.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mattys_media_core::{Cart, CartLine, CartTotals, merge_carts};

use super::observer::{ObserverRegistry, Subscription};
use super::persistence::CartPersistence;
use crate::error::{CartError, PersistenceError};
use crate::telemetry::{CartOperation, Telemetry, TelemetryEvent};

/// Outcome of the durable write that follows every mutation.
#[derive(Debug)]
#[must_use]
pub enum WriteThrough {
    /// The new cart was written to storage.
    Durable,
    /// The write failed. The in-memory mutation stands and the write is
    /// retried on the next mutation or [`CartStore::flush`].
    Deferred(PersistenceError),
}

/// Result of [`CartStore::merge_remote`].
#[derive(Debug)]
pub struct MergeOutcome {
    /// The cart now installed in the store.
    pub merged: Cart,
    /// Number of local lines the merge started from.
    pub local_lines: usize,
    /// Outcome of the durable write.
    pub write: WriteThrough,
}

impl WriteThrough {
    /// Whether the write reached storage.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        matches!(self, Self::Durable)
    }
}

struct StoreState {
    cart: Cart,
    generation: u64,
    write_pending: bool,
}

struct StoreInner {
    state: Mutex<StoreState>,
    persistence: CartPersistence,
    observers: ObserverRegistry<Cart>,
    telemetry: Arc<dyn Telemetry>,
}

/// Holds the current cart, mirrors it to storage, and notifies observers.
///
/// Cheaply cloneable; clones share the same cart.
///
/// Each mutation body runs inside one critical section and never awaits,
/// so a find-then-update span cannot be interleaved with another mutation.
/// The snapshot of the new value is queued for observers inside that
/// critical section and delivered after it, so observers see values in
/// mutation order even when mutations race on different threads.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CartStore")
            .field("lines", &state.cart.len())
            .field("write_pending", &state.write_pending)
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

impl CartStore {
    /// Open the store, hydrating from `persistence`.
    ///
    /// A missing or unreadable stored cart yields an empty cart.
    #[must_use]
    pub fn open(persistence: CartPersistence, telemetry: Arc<dyn Telemetry>) -> Self {
        let cart = persistence.read().unwrap_or_default();
        tracing::debug!(lines = cart.len(), key = persistence.key(), "Cart hydrated");

        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState {
                    cart,
                    generation: 0,
                    write_pending: false,
                }),
                persistence,
                observers: ObserverRegistry::new(),
                telemetry,
            }),
        }
    }

    /// Snapshot of the current cart.
    #[must_use]
    pub fn current(&self) -> Cart {
        self.lock().cart.clone()
    }

    /// Item count and total price of the current cart.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        self.lock().cart.totals()
    }

    /// Whether the last durable write failed and has not been retried.
    #[must_use]
    pub fn write_pending(&self) -> bool {
        self.lock().write_pending
    }

    /// Add a line, merging into an existing line with the same identity key.
    ///
    /// The existing line keeps its name and unit price.
    pub fn add(&self, line: CartLine) -> WriteThrough {
        let ((), write) = infallible(self.mutate(CartOperation::Add, |cart| {
            cart.add(line);
            Ok(())
        }));
        write
    }

    /// Remove the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::OutOfRange` if `index` does not reference a line.
    pub fn remove(&self, index: usize) -> Result<WriteThrough, CartError> {
        self.mutate(CartOperation::Remove, |cart| {
            cart.remove(index).map(|_| ()).map_err(CartError::from)
        })
        .map(|(_, write)| write)
    }

    /// Set the quantity at `index`. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::OutOfRange` if `index` does not reference a line.
    pub fn set_quantity(&self, index: usize, quantity: i64) -> Result<WriteThrough, CartError> {
        let operation = if quantity <= 0 {
            CartOperation::Remove
        } else {
            CartOperation::SetQuantity
        };
        self.mutate(operation, |cart| {
            cart.set_quantity(index, quantity).map_err(CartError::from)
        })
        .map(|(_, write)| write)
    }

    /// Empty the cart.
    pub fn clear(&self) -> WriteThrough {
        self.install(CartOperation::Clear, |_| Cart::new())
    }

    /// Replace the whole cart atomically.
    pub fn replace(&self, cart: Cart) -> WriteThrough {
        self.install(CartOperation::Replace, move |_| cart)
    }

    /// Merge the current cart into `remote` and install the result.
    ///
    /// The read of the local cart and the install of the merge happen in the
    /// same critical section.
    pub fn merge_remote(&self, remote: &Cart) -> MergeOutcome {
        let ((merged, local_lines), write) =
            infallible(self.mutate(CartOperation::Merge, |cart| {
                let local_lines = cart.len();
                *cart = merge_carts(remote, cart);
                Ok((cart.clone(), local_lines))
            }));
        MergeOutcome {
            merged,
            local_lines,
            write,
        }
    }

    /// Retry a failed durable write. No-op when nothing is pending.
    pub fn flush(&self) -> WriteThrough {
        let mut state = self.lock();
        if !state.write_pending {
            return WriteThrough::Durable;
        }
        self.write_through(&mut state, CartOperation::Flush)
    }

    /// Register `observer` for every future cart value.
    ///
    /// The observer first receives the current cart, then the value after
    /// each successful mutation until the returned handle is released. If
    /// another thread is delivering notifications at the time, the replay is
    /// delivered by that thread in order.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Cart) + Send + Sync + 'static,
    {
        let subscription = {
            let state = self.lock();
            self.inner
                .observers
                .register_replaying(state.generation, state.cart.clone(), observer)
        };
        self.inner.observers.dispatch();
        subscription
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.observers.len()
    }

    fn install<F>(&self, operation: CartOperation, build: F) -> WriteThrough
    where
        F: FnOnce(&Cart) -> Cart,
    {
        let ((), write) = infallible(self.mutate(operation, |cart| {
            *cart = build(cart);
            Ok(())
        }));
        write
    }

    fn mutate<T, E, F>(&self, operation: CartOperation, apply: F) -> Result<(T, WriteThrough), E>
    where
        F: FnOnce(&mut Cart) -> Result<T, E>,
    {
        let (value, write, line_count) = {
            let mut state = self.lock();
            let value = apply(&mut state.cart)?;
            let write = self.write_through(&mut state, operation);
            state.generation += 1;
            self.inner
                .observers
                .publish(state.generation, state.cart.clone());
            (value, write, state.cart.len())
        };

        self.inner
            .telemetry
            .report(&TelemetryEvent::CartMutated { operation, line_count });
        self.inner.observers.dispatch();
        Ok((value, write))
    }

    fn write_through(&self, state: &mut StoreState, operation: CartOperation) -> WriteThrough {
        match self.inner.persistence.write(&state.cart) {
            Ok(()) => {
                if state.write_pending {
                    state.write_pending = false;
                    self.inner
                        .telemetry
                        .report(&TelemetryEvent::PersistenceRecovered { operation });
                }
                WriteThrough::Durable
            }
            Err(e) => {
                state.write_pending = true;
                self.inner.telemetry.report(&TelemetryEvent::PersistenceFailed {
                    operation,
                    error: e.to_string(),
                });
                WriteThrough::Deferred(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
