//! Login-time merge of a local (anonymous) cart into a server-held cart.

use super::Cart;

/// Merge `local` into `remote`.
///
/// The result starts as a copy of `remote` in remote order. Each local line
/// whose identity key already exists has its quantity added to that line
/// (the remote line's name and price are kept); every other local line is
/// appended in local order.
///
/// Ordering is not commutative (remote order wins). Resulting quantities are:
/// swapping the arguments yields the same quantity for every key.
///
/// # Example
///
/// ```
/// use mattys_media_core::{Cart, CartLine, Price, Quantity, merge_carts};
///
/// let line = |id: &str, qty: u32| {
///     CartLine::new(id, id, Quantity::new(qty).unwrap(), Price::ZERO)
/// };
/// let remote = Cart::from_lines([line("a", 3), line("b", 1)]);
/// let local = Cart::from_lines([line("a", 2)]);
///
/// let merged = merge_carts(&remote, &local);
/// assert_eq!(merged.get(0).unwrap().quantity.get(), 5);
/// assert_eq!(merged.len(), 2);
/// ```
#[must_use]
pub fn merge_carts(remote: &Cart, local: &Cart) -> Cart {
    let mut merged = remote.clone();
    for line in local {
        merged.add(line.clone());
    }
    merged
}
