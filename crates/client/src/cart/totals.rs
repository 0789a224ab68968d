//! Reactive totals projection.

use std::sync::{Arc, Mutex, PoisonError};

use mattys_media_core::CartTotals;

use super::observer::Subscription;
use super::store::CartStore;

/// Item count and total price, recomputed on every cart change.
///
/// Used by the navbar badge and the cart and checkout summaries.
#[derive(Debug)]
pub struct TotalsView {
    latest: Arc<Mutex<CartTotals>>,
    _subscription: Subscription,
}

impl TotalsView {
    /// Start tracking totals for `store`.
    #[must_use]
    pub fn attach(store: &CartStore) -> Self {
        let latest = Arc::new(Mutex::new(CartTotals::default()));
        let sink = Arc::clone(&latest);
        let subscription = store.subscribe(move |cart| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = cart.totals();
        });

        Self {
            latest,
            _subscription: subscription,
        }
    }

    /// The most recent totals.
    #[must_use]
    pub fn get(&self) -> CartTotals {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mattys_media_core::{CartLine, Price, Quantity};
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::CartPersistence;
    use crate::storage::MemoryStore;
    use crate::telemetry::RecordingTelemetry;

    #[test]
    fn test_totals_follow_store() {
        let telemetry = Arc::new(RecordingTelemetry::new());
        let persistence = CartPersistence::new(Arc::new(MemoryStore::new()), telemetry.clone());
        let store = CartStore::open(persistence, telemetry);

        let _ = store.add(CartLine::new(
            "cards",
            "Business Cards",
            Quantity::new(2).unwrap(),
            Price::from_cents(2999).unwrap(),
        ));

        let view = TotalsView::attach(&store);
        assert_eq!(view.get().item_count, 2);
        assert_eq!(view.get().total_price, Decimal::new(5998, 2));

        let _ = store.add(CartLine::new(
            "stickers",
            "Stickers",
            Quantity::new(10).unwrap(),
            Price::from_cents(50).unwrap(),
        ));
        assert_eq!(view.get().item_count, 12);
        assert_eq!(view.get().total_price, Decimal::new(6498, 2));

        let _ = store.clear();
        assert_eq!(view.get(), CartTotals::default());
    }

    #[test]
    fn test_huge_prices_saturate_instead_of_panicking() {
        let telemetry = Arc::new(RecordingTelemetry::new());
        let persistence = CartPersistence::new(Arc::new(MemoryStore::new()), telemetry.clone());
        let store = CartStore::open(persistence, telemetry);
        let view = TotalsView::attach(&store);

        let _ = store.add(CartLine::new(
            "billboard",
            "Billboard",
            Quantity::new(2).unwrap(),
            Price::new(Decimal::MAX / Decimal::TWO + Decimal::ONE).unwrap(),
        ));

        assert_eq!(view.get().item_count, 2);
        assert_eq!(view.get().total_price, Decimal::MAX);
        assert_eq!(store.totals(), view.get());
    }

    #[test]
    fn test_dropping_view_unsubscribes() {
        let telemetry = Arc::new(RecordingTelemetry::new());
        let persistence = CartPersistence::new(Arc::new(MemoryStore::new()), telemetry.clone());
        let store = CartStore::open(persistence, telemetry);

        let view = TotalsView::attach(&store);
        assert_eq!(store.subscriber_count(), 1);
        drop(view);
        assert_eq!(store.subscriber_count(), 0);
    }
}
