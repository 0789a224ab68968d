//! Cart line and the line identity rule.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId, Quantity};

/// One purchasable line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Display label, denormalized so the cart renders offline.
    pub product_name: String,
    /// Number of units (always at least one).
    pub quantity: Quantity,
    /// Personalization text. `None` and `Some("")` are different lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    /// Unit price captured when the line was first added.
    pub unit_price: Price,
}

/// Identity key of a [`CartLine`]: product plus optional personalization.
///
/// Two lines with equal keys are the same line; adding one merges into the
/// other instead of appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineKey<'a> {
    pub product_id: &'a ProductId,
    pub custom_text: Option<&'a str>,
}

impl CartLine {
    /// Create a line without personalization text.
    #[must_use]
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: Quantity,
        unit_price: Price,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            custom_text: None,
            unit_price,
        }
    }

    /// Attach personalization text to the line.
    #[must_use]
    pub fn with_custom_text(mut self, text: impl Into<String>) -> Self {
        self.custom_text = Some(text.into());
        self
    }

    /// The identity key of this line.
    #[must_use]
    pub fn key(&self) -> LineKey<'_> {
        LineKey {
            product_id: &self.product_id,
            custom_text: self.custom_text.as_deref(),
        }
    }

    /// Whether `other` is the same line under the identity rule.
    #[must_use]
    pub fn is_same_line(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    /// Total for this line (quantity x unit price).
    #[must_use]
    pub fn line_total(&self) -> rust_decimal::Decimal {
        self.unit_price.times(self.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mug() -> CartLine {
        CartLine::new(
            "mug",
            "Custom Mug",
            Quantity::ONE,
            Price::from_cents(1500).unwrap(),
        )
    }

    #[test]
    fn test_absent_and_empty_custom_text_are_distinct() {
        let plain = mug();
        let empty = mug().with_custom_text("");
        assert!(!plain.is_same_line(&empty));
        assert!(empty.is_same_line(&mug().with_custom_text("")));
    }

    #[test]
    fn test_identity_ignores_price_and_name() {
        let mut other = mug();
        other.product_name = "Renamed".to_string();
        other.unit_price = Price::from_cents(9900).unwrap();
        assert!(mug().is_same_line(&other));
    }

    #[test]
    fn test_custom_text_omitted_when_absent() {
        let json = serde_json::to_value(mug()).unwrap();
        assert!(json.get("custom_text").is_none());

        let json = serde_json::to_value(mug().with_custom_text("")).unwrap();
        assert_eq!(json["custom_text"], "");
    }
}
