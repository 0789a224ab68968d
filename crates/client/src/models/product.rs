//! Catalog product models.

use mattys_media_core::{CartLine, Price, PriceError, ProductId, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product as listed by the catalog endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Catalog slug such as `business-cards`.
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Unit price in dollars, sent by the backend as a JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    /// The catalog price as a validated [`Price`].
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the backend sent a negative price.
    pub fn price(&self) -> Result<Price, PriceError> {
        Price::new(self.base_price)
    }

    /// A cart line snapshotting this product's name and price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the backend sent a negative price.
    pub fn cart_line(
        &self,
        quantity: Quantity,
        custom_text: Option<String>,
    ) -> Result<CartLine, PriceError> {
        let line = CartLine::new(self.id.clone(), self.name.clone(), quantity, self.price()?);
        Ok(match custom_text {
            Some(text) => line.with_custom_text(text),
            None => line,
        })
    }
}
