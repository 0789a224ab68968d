//! Observer list with disposable subscriptions and ordered delivery.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    since: u64,
    callback: Callback<T>,
}

struct Registry<T> {
    next_id: u64,
    observers: Vec<Entry<T>>,
}

enum Delivery<T> {
    Broadcast { generation: u64, value: T },
    Replay { callback: Callback<T>, value: T },
}

struct Outbox<T> {
    queue: VecDeque<Delivery<T>>,
    draining: bool,
}

/// Something a [`Subscription`] can detach itself from.
trait Unregister: Send + Sync {
    fn unregister(&self, id: u64);
}

impl<T: 'static> Unregister for Mutex<Registry<T>> {
    fn unregister(&self, id: u64) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observers
            .retain(|entry| entry.id != id);
    }
}

/// A list of callbacks fed from an ordered outbox.
///
/// Values are queued with [`publish`](Self::publish), usually while the
/// publisher still holds the lock that produced them, and handed out by
/// [`dispatch`](Self::dispatch) in queue order. Only one thread drains the
/// outbox at a time; a value published while another thread is draining is
/// delivered by that thread. Callbacks run with no lock held, so a callback
/// may subscribe, release, or publish again without deadlocking.
pub struct ObserverRegistry<T> {
    inner: Arc<Mutex<Registry<T>>>,
    outbox: Mutex<Outbox<T>>,
}

impl<T> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                observers: Vec::new(),
            })),
            outbox: Mutex::new(Outbox {
                queue: VecDeque::new(),
                draining: false,
            }),
        }
    }
}

impl<T: 'static> std::fmt::Debug for ObserverRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.lock().observers.len())
            .field("queued", &self.lock_outbox().queue.len())
            .finish()
    }
}

impl<T: 'static> ObserverRegistry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for every broadcast published from now on.
    pub fn register<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.insert(0, Arc::new(observer))
    }

    /// Register `observer` as of `generation` and queue `current` as its
    /// first value.
    ///
    /// Broadcasts already queued at or below `generation` are not delivered
    /// to it.
    pub fn register_replaying<F>(&self, generation: u64, current: T, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(observer);
        let subscription = self.insert(generation, Arc::clone(&callback));
        self.lock_outbox().queue.push_back(Delivery::Replay {
            callback,
            value: current,
        });
        subscription
    }

    /// Queue `value` for every observer registered before `generation`.
    pub fn publish(&self, generation: u64, value: T) {
        self.lock_outbox()
            .queue
            .push_back(Delivery::Broadcast { generation, value });
    }

    /// Deliver queued values in order.
    ///
    /// Returns immediately if another caller is already draining.
    pub fn dispatch(&self) {
        {
            let mut outbox = self.lock_outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _draining = DrainGuard(&self.outbox);

        loop {
            let Some(delivery) = self.lock_outbox().queue.pop_front() else {
                return;
            };
            match delivery {
                Delivery::Broadcast { generation, value } => {
                    for observer in self.observers_before(generation) {
                        observer(&value);
                    }
                }
                Delivery::Replay { callback, value } => callback(&value),
            }
        }
    }

    /// Number of live observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().observers.len()
    }

    /// Whether no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, since: u64, callback: Callback<T>) -> Subscription {
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.observers.push(Entry {
                id,
                since,
                callback,
            });
            id
        };

        let inner: Arc<dyn Unregister> = self.inner.clone();
        Subscription {
            id,
            registry: Some(Arc::downgrade(&inner)),
        }
    }

    fn observers_before(&self, generation: u64) -> Vec<Callback<T>> {
        self.lock()
            .observers
            .iter()
            .filter(|entry| entry.since < generation)
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Outbox<T>> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the draining flag even if a callback panics.
struct DrainGuard<'a, T>(&'a Mutex<Outbox<T>>);

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).draining = false;
    }
}

/// Handle for a registered observer.
///
/// Releasing stops further notifications. Releasing twice is a no-op, and
/// dropping the handle releases it.
#[must_use = "dropping a Subscription immediately unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn Unregister>>,
}

impl Subscription {
    /// Stop delivering notifications to this observer.
    pub fn release(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.unregister(self.id);
        }
    }

    /// Whether [`release`](Self::release) has already run.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.registry.is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn notify<T: 'static>(registry: &ObserverRegistry<T>, value: T) {
        registry.publish(u64::MAX, value);
        registry.dispatch();
    }

    #[test]
    fn test_notify_reaches_all_observers() {
        let registry = ObserverRegistry::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = total.clone();
        let _a = registry.register(move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let t2 = total.clone();
        let _b = registry.register(move |v| {
            t2.fetch_add(*v as usize * 10, Ordering::SeqCst);
        });

        notify(&registry, 2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = ObserverRegistry::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let mut sub = registry.register(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        notify(&registry, 1);
        sub.release();
        sub.release();
        notify(&registry, 1);

        assert!(sub.is_released());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drop_releases() {
        let registry = ObserverRegistry::<u32>::new();
        {
            let _sub = registry.register(|_| {});
            assert_eq!(registry.len(), 1);
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_replaying_observer_skips_older_broadcasts() {
        let registry = ObserverRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.publish(1, 10);
        let s = seen.clone();
        let _sub = registry.register_replaying(1, 10, move |v| s.lock().unwrap().push(*v));
        registry.publish(2, 20);
        registry.dispatch();

        assert_eq!(*seen.lock().unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_publish_from_callback_is_delivered_after_it() {
        let registry = Arc::new(ObserverRegistry::<u32>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        let r = Arc::downgrade(&registry);
        let _sub = registry.register(move |v| {
            s.lock().unwrap().push(*v);
            if *v == 1 {
                if let Some(registry) = r.upgrade() {
                    notify(registry.as_ref(), 2);
                    s.lock().unwrap().push(100);
                }
            }
        });

        notify(registry.as_ref(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1, 100, 2]);
    }

    #[test]
    fn test_release_after_registry_dropped() {
        let registry = ObserverRegistry::<u32>::new();
        let mut sub = registry.register(|_| {});
        drop(registry);
        sub.release();
        assert!(sub.is_released());
    }
}
