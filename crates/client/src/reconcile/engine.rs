use std::sync::Arc;

use mattys_media_core::Cart;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use sentry::SentryFutureExt;
use tracing::{Span, instrument};
use uuid::Uuid;

use super::remote::{CartRemote, RemoteError};
use crate::cart::{CartStore, WriteThrough};
use crate::services::auth::AuthEvent;
use crate::telemetry::{Telemetry, TelemetryEvent};

/// Outcome of pushing a cart to the server.
#[derive(Debug)]
pub enum PushStatus {
    Pushed,
    Failed(RemoteError),
}

impl PushStatus {
    /// Whether the server accepted the cart.
    #[must_use]
    pub const fn is_pushed(&self) -> bool {
        matches!(self, Self::Pushed)
    }
}

/// What a reconciliation run did.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The server cart could not be fetched. Nothing changed.
    Aborted { error: RemoteError },
    /// The server cart was empty; the local cart was pushed unchanged.
    SeededRemote { pushed: Cart, push: PushStatus },
    /// The carts were merged, installed locally, and pushed.
    Merged {
        merged: Cart,
        write: WriteThrough,
        push: PushStatus,
    },
}

impl ReconcileOutcome {
    /// Whether every step of the run succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        match self {
            Self::Aborted { .. } => false,
            Self::SeededRemote { push, .. } => push.is_pushed(),
            Self::Merged { write, push, .. } => write.is_durable() && push.is_pushed(),
        }
    }
}

struct EngineInner<R> {
    store: CartStore,
    remote: R,
    telemetry: Arc<dyn Telemetry>,
    gate: Mutex<()>,
}

/// Merges the local cart with the server cart after authentication.
///
/// Cheaply cloneable; clones share the same run gate.
pub struct ReconciliationEngine<R> {
    inner: Arc<EngineInner<R>>,
}

impl<R> Clone for ReconciliationEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> std::fmt::Debug for ReconciliationEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl<R: CartRemote + 'static> ReconciliationEngine<R> {
    /// Create an engine that installs merges into `store`.
    #[must_use]
    pub fn new(store: CartStore, remote: R, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                remote,
                telemetry,
                gate: Mutex::new(()),
            }),
        }
    }

    /// The remote this engine reconciles against.
    #[must_use]
    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    /// Reconcile in response to an authentication event.
    pub async fn handle(&self, event: &AuthEvent) -> ReconcileOutcome {
        tracing::info!(
            user_id = %event.user.id,
            kind = event.kind.as_str(),
            "Reconciling cart after authentication"
        );
        self.reconcile().await
    }

    /// Run one reconciliation. Waits for any run already in progress.
    #[instrument(name = "reconcile", skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let run_id = Uuid::new_v4().to_string();
        Span::current().record("run_id", &run_id);

        let _guard = self.inner.gate.lock().await;

        // Events captured during the run carry its id; the tag ends with it
        let hub = Arc::new(sentry::Hub::new_from_top(sentry::Hub::current()));
        hub.configure_scope(|scope| scope.set_tag("reconcile_run_id", &run_id));
        self.run().bind_hub(hub).await
    }

    async fn run(&self) -> ReconcileOutcome {
        let remote = match self.inner.remote.fetch_cart().await {
            Ok(cart) => cart,
            Err(error) => {
                self.inner.telemetry.report(&TelemetryEvent::RemoteFetchFailed {
                    error: error.to_string(),
                });
                return ReconcileOutcome::Aborted { error };
            }
        };

        if remote.is_empty() {
            let local = self.inner.store.current();
            let push = self.push(&local).await;
            self.inner.telemetry.report(&TelemetryEvent::Reconciled {
                remote_lines: 0,
                local_lines: local.len(),
                merged_lines: local.len(),
            });
            return ReconcileOutcome::SeededRemote {
                pushed: local,
                push,
            };
        }

        let outcome = self.inner.store.merge_remote(&remote);
        self.inner.telemetry.report(&TelemetryEvent::Reconciled {
            remote_lines: remote.len(),
            local_lines: outcome.local_lines,
            merged_lines: outcome.merged.len(),
        });
        let push = self.push(&outcome.merged).await;

        ReconcileOutcome::Merged {
            merged: outcome.merged,
            write: outcome.write,
            push,
        }
    }

    /// Reconcile once per event until the channel closes.
    ///
    /// Events are handled one at a time in arrival order. Events dropped
    /// because the receiver lagged are logged and skipped.
    pub async fn listen(&self, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let _ = self.handle(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth event listener lagged; events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Auth event channel closed; listener exiting");
                    break;
                }
            }
        }
    }

    /// Spawn [`listen`](Self::listen) on the current Tokio runtime.
    pub fn spawn_listener(&self, events: broadcast::Receiver<AuthEvent>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.listen(events).await })
    }

    async fn push(&self, cart: &Cart) -> PushStatus {
        match self.inner.remote.push_cart(cart).await {
            Ok(()) => {
                tracing::debug!(lines = cart.len(), "Pushed cart to server");
                PushStatus::Pushed
            }
            Err(error) => {
                self.inner.telemetry.report(&TelemetryEvent::RemotePushFailed {
                    error: error.to_string(),
                });
                PushStatus::Failed(error)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Mutex as StdMutex, PoisonError};
    use std::time::Duration;

    use mattys_media_core::{CartLine, Price, Quantity, UserId};

    use super::*;
    use crate::cart::CartPersistence;
    use crate::models::User;
    use crate::services::auth::AuthKind;
    use crate::storage::MemoryStore;
    use crate::telemetry::RecordingTelemetry;

    #[derive(Default)]
    struct FakeRemote {
        server: StdMutex<Cart>,
        pushes: StdMutex<Vec<Cart>>,
        fail_fetch: bool,
        fail_push: bool,
        fetch_delay: Option<Duration>,
    }

    impl FakeRemote {
        fn with_server(cart: Cart) -> Self {
            Self {
                server: StdMutex::new(cart),
                ..Self::default()
            }
        }

        fn pushes(&self) -> Vec<Cart> {
            self.pushes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl CartRemote for FakeRemote {
        async fn fetch_cart(&self) -> Result<Cart, RemoteError> {
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_fetch {
                return Err(RemoteError::Unavailable("connection refused".to_string()));
            }
            Ok(self.server.lock().unwrap().clone())
        }

        async fn push_cart(&self, cart: &Cart) -> Result<(), RemoteError> {
            if self.fail_push {
                return Err(RemoteError::Unavailable("connection reset".to_string()));
            }
            *self.server.lock().unwrap() = cart.clone();
            self.pushes.lock().unwrap().push(cart.clone());
            Ok(())
        }
    }

    fn line(id: &str, quantity: u32) -> CartLine {
        CartLine::new(
            id,
            id.to_uppercase(),
            Quantity::new(quantity).unwrap(),
            Price::from_cents(1000).unwrap(),
        )
    }

    fn quantities(cart: &Cart) -> Vec<(String, u32)> {
        cart.iter()
            .map(|l| (l.product_id.to_string(), l.quantity.get()))
            .collect()
    }

    fn pairs(items: &[(&str, u32)]) -> Vec<(String, u32)> {
        items.iter().map(|(id, q)| ((*id).to_string(), *q)).collect()
    }

    struct Harness {
        store: CartStore,
        telemetry: Arc<RecordingTelemetry>,
        engine: ReconciliationEngine<FakeRemote>,
    }

    fn harness(remote: FakeRemote) -> Harness {
        let telemetry = Arc::new(RecordingTelemetry::new());
        let persistence = CartPersistence::new(Arc::new(MemoryStore::new()), telemetry.clone());
        let store = CartStore::open(persistence, telemetry.clone());
        let engine = ReconciliationEngine::new(store.clone(), remote, telemetry.clone());
        Harness {
            store,
            telemetry,
            engine,
        }
    }

    #[tokio::test]
    async fn test_merge_sums_matching_lines() {
        let h = harness(FakeRemote::with_server(Cart::from_lines([
            line("a", 3),
            line("b", 1),
        ])));
        let _ = h.store.add(line("a", 2));

        let outcome = h.engine.reconcile().await;

        assert!(outcome.is_complete());
        assert_eq!(quantities(&h.store.current()), pairs(&[("a", 5), ("b", 1)]));
        assert_eq!(h.engine.remote().pushes(), vec![h.store.current()]);
    }

    #[tokio::test]
    async fn test_merge_appends_local_only_lines() {
        let h = harness(FakeRemote::with_server(Cart::from_lines([
            line("a", 1),
            line("b", 1),
        ])));
        let _ = h.store.add(line("c", 1));

        let outcome = h.engine.reconcile().await;

        assert!(matches!(outcome, ReconcileOutcome::Merged { .. }));
        assert_eq!(
            quantities(&h.store.current()),
            pairs(&[("a", 1), ("b", 1), ("c", 1)])
        );
        assert!(matches!(
            h.telemetry.events().last(),
            Some(TelemetryEvent::Reconciled {
                remote_lines: 2,
                local_lines: 1,
                merged_lines: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_remote_is_seeded_with_local_cart() {
        let h = harness(FakeRemote::default());
        let _ = h.store.add(line("a", 2));
        let before = h.store.current();

        let outcome = h.engine.reconcile().await;

        assert!(matches!(
            outcome,
            ReconcileOutcome::SeededRemote { ref pushed, push: PushStatus::Pushed } if *pushed == before
        ));
        assert_eq!(h.store.current(), before);
        assert_eq!(h.engine.remote().pushes(), vec![before]);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cart_untouched() {
        let h = harness(FakeRemote {
            fail_fetch: true,
            ..FakeRemote::default()
        });
        let _ = h.store.add(line("a", 2));
        let before = h.store.current();

        let outcome = h.engine.reconcile().await;

        assert!(matches!(outcome, ReconcileOutcome::Aborted { .. }));
        assert_eq!(h.store.current(), before);
        assert!(h.engine.remote().pushes().is_empty());
        assert!(matches!(
            h.telemetry.failures().as_slice(),
            [TelemetryEvent::RemoteFetchFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_push_failure_keeps_merged_cart() {
        let remote = FakeRemote {
            fail_push: true,
            ..FakeRemote::with_server(Cart::from_lines([line("a", 3)]))
        };
        let h = harness(remote);
        let _ = h.store.add(line("a", 2));

        let outcome = h.engine.reconcile().await;

        assert!(matches!(
            outcome,
            ReconcileOutcome::Merged {
                push: PushStatus::Failed(_),
                ..
            }
        ));
        assert!(!outcome.is_complete());
        assert_eq!(quantities(&h.store.current()), pairs(&[("a", 5)]));
        assert!(matches!(
            h.telemetry.failures().as_slice(),
            [TelemetryEvent::RemotePushFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_mutation_during_fetch_is_kept() {
        let remote = FakeRemote {
            fetch_delay: Some(Duration::from_millis(20)),
            ..FakeRemote::with_server(Cart::from_lines([line("a", 1)]))
        };
        let h = harness(remote);

        let engine = h.engine.clone();
        let run = tokio::spawn(async move { engine.reconcile().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _ = h.store.add(line("b", 4));
        let _ = run.await.unwrap();

        assert_eq!(quantities(&h.store.current()), pairs(&[("a", 1), ("b", 4)]));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_serialized() {
        let remote = FakeRemote {
            fetch_delay: Some(Duration::from_millis(10)),
            ..FakeRemote::with_server(Cart::from_lines([line("a", 1)]))
        };
        let h = harness(remote);
        let _ = h.store.add(line("b", 1));

        let (first, second) = tokio::join!(h.engine.reconcile(), h.engine.reconcile());
        assert!(first.is_complete());
        assert!(second.is_complete());

        // The second run starts from what the first pushed
        let pushes = h.engine.remote().pushes();
        assert_eq!(pushes.len(), 2);
        assert_eq!(quantities(&pushes[0]), pairs(&[("a", 1), ("b", 1)]));
        assert_eq!(quantities(&pushes[1]), pairs(&[("a", 2), ("b", 2)]));
        assert_eq!(h.store.current(), pushes[1]);
    }

    #[tokio::test]
    async fn test_listener_reconciles_each_event() {
        let h = harness(FakeRemote::with_server(Cart::from_lines([line("a", 1)])));
        let (sender, receiver) = broadcast::channel(4);
        let listener = h.engine.spawn_listener(receiver);

        let user = User {
            id: UserId::new("u-1"),
            email: "matty@example.com".to_string(),
            name: "Matty".to_string(),
        };
        sender
            .send(AuthEvent {
                kind: AuthKind::Login,
                user,
            })
            .unwrap();
        drop(sender);
        listener.await.unwrap();

        assert_eq!(h.engine.remote().pushes().len(), 1);
        assert_eq!(quantities(&h.store.current()), pairs(&[("a", 1)]));
    }

    #[test]
    fn test_run_id_tag_is_scoped_to_the_run() {
        let events = sentry::test::with_captured_events(|| {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let telemetry: Arc<dyn Telemetry> = Arc::new(crate::telemetry::TracingTelemetry);
                let persistence =
                    CartPersistence::new(Arc::new(MemoryStore::new()), telemetry.clone());
                let store = CartStore::open(persistence, telemetry.clone());
                let remote = FakeRemote {
                    fail_fetch: true,
                    ..FakeRemote::default()
                };
                let engine = ReconciliationEngine::new(store, remote, telemetry);
                let _ = engine.reconcile().await;
            });
            sentry::capture_message("after reconcile", sentry::Level::Info);
        });

        assert_eq!(events.len(), 2);
        assert!(events[0].tags.contains_key("reconcile_run_id"));
        assert!(!events[1].tags.contains_key("reconcile_run_id"));
    }
}
