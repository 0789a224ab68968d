//! Integration tests for the Matty's Media storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mattys-media-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_reconciliation` - Auth events driving the reconciliation engine
//! - `cart_persistence` - Cart state surviving restarts and storage failures
//!
//! The server is replaced by [`FakeRemote`], an in-memory cart that records
//! every push.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mattys_media_client::models::User;
use mattys_media_client::reconcile::{CartRemote, RemoteError};
use mattys_media_core::{Cart, CartLine, Price, Quantity, UserId};

#[derive(Default)]
struct FakeRemoteInner {
    server: Mutex<Cart>,
    pushes: Mutex<Vec<Cart>>,
    fetches: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_push: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
}

/// In-memory stand-in for the backend cart endpoints.
///
/// Clones share the same server cart.
#[derive(Clone, Default)]
pub struct FakeRemote {
    inner: Arc<FakeRemoteInner>,
}

impl FakeRemote {
    /// A remote with an empty server cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote whose server cart starts as `cart`.
    #[must_use]
    pub fn with_server_cart(cart: Cart) -> Self {
        let remote = Self::new();
        *lock(&remote.inner.server) = cart;
        remote
    }

    /// Current server cart.
    #[must_use]
    pub fn server_cart(&self) -> Cart {
        lock(&self.inner.server).clone()
    }

    /// Every cart pushed so far, oldest first.
    #[must_use]
    pub fn pushes(&self) -> Vec<Cart> {
        lock(&self.inner.pushes).clone()
    }

    /// Number of fetches attempted.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Make every fetch fail until reset.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.inner.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make every push fail until reset.
    pub fn set_fail_push(&self, fail: bool) {
        self.inner.fail_push.store(fail, Ordering::SeqCst);
    }

    /// Delay each fetch, widening the window for concurrent activity.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *lock(&self.inner.fetch_delay) = delay;
    }

    /// Wait until `count` fetches have been attempted and settled.
    ///
    /// Returns `false` on timeout.
    pub async fn wait_for_fetches(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.fetch_count() >= count).await
    }

    /// Wait until `count` pushes have been recorded.
    ///
    /// Returns `false` on timeout.
    pub async fn wait_for_pushes(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || lock(&self.inner.pushes).len() >= count).await
    }
}

impl CartRemote for FakeRemote {
    async fn fetch_cart(&self) -> Result<Cart, RemoteError> {
        let delay = *lock(&self.inner.fetch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.inner.fail_fetch.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("fetch refused".to_string()))
        } else {
            Ok(self.server_cart())
        };
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn push_cart(&self, cart: &Cart) -> Result<(), RemoteError> {
        if self.inner.fail_push.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("push refused".to_string()));
        }
        *lock(&self.inner.server) = cart.clone();
        lock(&self.inner.pushes).push(cart.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn wait_until<F: Fn() -> bool>(timeout: Duration, done: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !done() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    true
}

/// A cart line priced at `cents` per unit.
///
/// # Panics
///
/// Panics if `quantity` is zero or `cents` is negative.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn line(product_id: &str, quantity: u32, cents: i64) -> CartLine {
    CartLine::new(
        product_id,
        product_id.to_uppercase(),
        Quantity::new(quantity).unwrap(),
        Price::from_cents(cents).unwrap(),
    )
}

/// `(product_id, quantity)` pairs in cart order.
#[must_use]
pub fn quantities(cart: &Cart) -> Vec<(String, u32)> {
    cart.iter()
        .map(|l| (l.product_id.to_string(), l.quantity.get()))
        .collect()
}

/// Owned `(product_id, quantity)` pairs for comparison with [`quantities`].
#[must_use]
pub fn pairs(items: &[(&str, u32)]) -> Vec<(String, u32)> {
    items.iter().map(|(id, q)| ((*id).to_string(), *q)).collect()
}

/// A signed-in customer.
#[must_use]
pub fn sample_user() -> User {
    User {
        id: UserId::new("user-42"),
        email: "matty@example.com".to_string(),
        name: "Matty".to_string(),
    }
}

/// A fresh directory under the system temp dir.
#[must_use]
pub fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("mattys-media-it-{}", uuid::Uuid::new_v4()))
}
