//! Cart model.
//!
//! A [`Cart`] is an ordered sequence of [`CartLine`]s in insertion order.
//! The only deduplication is the identity rule: no two lines share a
//! [`LineKey`]. Every constructor and mutation upholds that invariant,
//! including deserialization.

mod line;
mod merge;

pub use line::{CartLine, LineKey};
pub use merge::merge_carts;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Quantity;

/// A mutation referenced a line position that does not exist.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("line {index} is out of range for a cart with {len} lines")]
pub struct OutOfRange {
    /// Requested position.
    pub index: usize,
    /// Number of lines at the time of the request.
    pub len: usize,
}

/// Derived totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of line quantities.
    pub item_count: u64,
    /// Sum of quantity x unit price, saturating at [`Decimal::MAX`].
    pub total_price: Decimal,
}

/// An ordered shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart by adding `lines` in order.
    ///
    /// Lines that share an identity key are folded into the first occurrence.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line);
        }
        cart
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Iterate over lines in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, CartLine> {
        self.lines.iter()
    }

    /// Line at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CartLine> {
        self.lines.get(index)
    }

    /// Number of lines (not units).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Position of the line with the given identity key.
    #[must_use]
    pub fn position(&self, key: LineKey<'_>) -> Option<usize> {
        self.lines.iter().position(|line| line.key() == key)
    }

    /// Add a line, returning the position it now occupies.
    ///
    /// If a line with the same identity key exists its quantity is increased
    /// and its name and unit price are kept. Otherwise the line is appended.
    pub fn add(&mut self, line: CartLine) -> usize {
        if let Some(index) = self.position(line.key()) {
            if let Some(existing) = self.lines.get_mut(index) {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            }
            return index;
        }
        self.lines.push(line);
        self.lines.len() - 1
    }

    /// Remove and return the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRange`] if `index` does not reference a line.
    pub fn remove(&mut self, index: usize) -> Result<CartLine, OutOfRange> {
        if index >= self.lines.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.lines.remove(index))
    }

    /// Set the quantity at `index`. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRange`] if `index` does not reference a line.
    pub fn set_quantity(&mut self, index: usize, quantity: i64) -> Result<(), OutOfRange> {
        let Ok(quantity) = Quantity::try_from_signed(quantity) else {
            return self.remove(index).map(|_| ());
        };
        let out_of_range = self.out_of_range(index);
        let line = self.lines.get_mut(index).ok_or(out_of_range)?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Item count and total price.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        self.lines.iter().fold(CartTotals::default(), |acc, line| CartTotals {
            item_count: acc.item_count.saturating_add(u64::from(line.quantity.get())),
            total_price: acc.total_price.saturating_add(line.line_total()),
        })
    }

    fn out_of_range(&self, index: usize) -> OutOfRange {
        OutOfRange {
            index,
            len: self.lines.len(),
        }
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Cart> for Vec<CartLine> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

impl FromIterator<CartLine> for Cart {
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        Self::from_lines(iter)
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartLine;
    type IntoIter = std::slice::Iter<'a, CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

impl IntoIterator for Cart {
    type Item = CartLine;
    type IntoIter = std::vec::IntoIter<CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}
