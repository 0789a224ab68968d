//! Server wire format for cart lines.
//!
//! The backend (and carts persisted by earlier browser builds) encode lines
//! as `{product_id, product_name, quantity, custom_text, price}` with `price`
//! as a JSON number.

use mattys_media_core::{CartLine, Price, ProductId, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A cart line as exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub custom_text: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// A wire line that cannot become a [`CartLine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireLineError {
    #[error("invalid quantity for {product_id}: {source}")]
    Quantity {
        product_id: String,
        #[source]
        source: mattys_media_core::QuantityError,
    },
    #[error("invalid price for {product_id}: {source}")]
    Price {
        product_id: String,
        #[source]
        source: mattys_media_core::PriceError,
    },
}

impl TryFrom<WireLine> for CartLine {
    type Error = WireLineError;

    fn try_from(line: WireLine) -> Result<Self, Self::Error> {
        let quantity =
            Quantity::try_from_signed(line.quantity).map_err(|source| WireLineError::Quantity {
                product_id: line.product_id.clone(),
                source,
            })?;
        let unit_price = Price::new(line.price).map_err(|source| WireLineError::Price {
            product_id: line.product_id.clone(),
            source,
        })?;

        Ok(Self {
            product_id: ProductId::new(line.product_id),
            product_name: line.product_name,
            quantity,
            custom_text: line.custom_text,
            unit_price,
        })
    }
}

impl From<&CartLine> for WireLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.to_string(),
            product_name: line.product_name.clone(),
            quantity: i64::from(line.quantity.get()),
            custom_text: line.custom_text.clone(),
            price: line.unit_price.amount(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_line_parses_float_price() {
        let json = r#"{"product_id":"p1","product_name":"Business Cards","quantity":2,"custom_text":null,"price":29.99}"#;
        let wire: WireLine = serde_json::from_str(json).unwrap();
        let line = CartLine::try_from(wire).unwrap();

        assert_eq!(line.unit_price, Price::from_cents(2999).unwrap());
        assert_eq!(line.quantity.get(), 2);
        assert_eq!(line.custom_text, None);
    }

    #[test]
    fn test_wire_line_rejects_zero_quantity() {
        let wire = WireLine {
            product_id: "p1".to_string(),
            product_name: "Sticker".to_string(),
            quantity: 0,
            custom_text: None,
            price: Decimal::ONE,
        };
        assert!(matches!(
            CartLine::try_from(wire),
            Err(WireLineError::Quantity { .. })
        ));
    }

    #[test]
    fn test_wire_line_keeps_empty_custom_text() {
        let line = CartLine::new("p1", "Mug", Quantity::ONE, Price::ZERO).with_custom_text("");
        let wire = WireLine::from(&line);
        assert_eq!(wire.custom_text.as_deref(), Some(""));
        assert_eq!(CartLine::try_from(wire).unwrap(), line);
    }
}
