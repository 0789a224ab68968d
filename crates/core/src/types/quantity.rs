//! Line quantity type.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantities must be at least one.
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
}

/// Number of units on a cart line.
///
/// A quantity is always at least one. Operations that would drive a line to
/// zero remove the line instead, so there is no zero value to represent.
///
/// ## Examples
///
/// ```
/// use mattys_media_core::Quantity;
///
/// assert!(Quantity::new(2).is_some());
/// assert!(Quantity::new(0).is_none());
/// assert!(Quantity::try_from_signed(-4).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity, returning `None` for zero.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Create a quantity from a signed value, saturating above `u32::MAX`.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] if `value` is zero or negative.
    pub fn try_from_signed(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 {
            return Err(QuantityError::NotPositive(value));
        }
        let clamped = u32::try_from(value).unwrap_or(u32::MAX);
        Self::new(clamped).ok_or(QuantityError::NotPositive(value))
    }

    /// Get the underlying count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Add two quantities, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0.get()))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_zero() {
        assert!(Quantity::new(0).is_none());
        assert_eq!(Quantity::new(1), Some(Quantity::ONE));
    }

    #[test]
    fn test_try_from_signed() {
        assert_eq!(Quantity::try_from_signed(5).unwrap().get(), 5);
        assert_eq!(
            Quantity::try_from_signed(0),
            Err(QuantityError::NotPositive(0))
        );
        assert_eq!(
            Quantity::try_from_signed(-2),
            Err(QuantityError::NotPositive(-2))
        );
        assert_eq!(
            Quantity::try_from_signed(i64::MAX).unwrap().get(),
            u32::MAX
        );
    }

    #[test]
    fn test_saturating_add() {
        let big = Quantity::new(u32::MAX - 1).unwrap();
        assert_eq!(big.saturating_add(Quantity::new(5).unwrap()).get(), u32::MAX);
    }

    #[test]
    fn test_quantity_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
    }
}
