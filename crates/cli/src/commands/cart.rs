//! Cart commands.
//!
//! These edit the persisted local cart. `add` looks the product up in the
//! catalog unless a name and price are given by hand, and `clear --remote`
//! also empties the server cart.

use std::str::FromStr;

use mattys_media_client::error::CartError;
use mattys_media_client::services::api::ApiError;
use mattys_media_client::{StorefrontContext, WriteThrough};
use mattys_media_core::{Cart, CartLine, Price, PriceError, ProductId, Quantity};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    #[error("Invalid price {0:?}: expected a decimal amount like 12.50")]
    InvalidPrice(String),

    #[error("Invalid price: {0}")]
    NegativePrice(#[from] PriceError),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Backend request failed: {0}")]
    Api(#[from] ApiError),
}

/// A line entered by hand instead of looked up in the catalog.
#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub name: String,
    pub price: String,
}

/// Print the cart and its totals.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &StorefrontContext) {
    print!("{}", render(&ctx.store().current()));
}

/// Add a product line.
///
/// The name and unit price are snapshotted from the catalog product, or
/// taken from `manual` when given.
///
/// # Errors
///
/// Returns an error if the product cannot be fetched, or if the price or
/// quantity is invalid.
pub async fn add(
    ctx: &StorefrontContext,
    product_id: String,
    quantity: u32,
    custom_text: Option<String>,
    manual: Option<ManualEntry>,
) -> Result<(), CartCommandError> {
    let quantity = Quantity::new(quantity).ok_or(CartCommandError::InvalidQuantity(quantity))?;

    let line = match manual {
        Some(entry) => manual_line(product_id, entry, quantity, custom_text)?,
        None => {
            let product = ctx.api().get_product(&ProductId::new(product_id)).await?;
            product.cart_line(quantity, custom_text)?
        }
    };

    report_write(ctx.store().add(line));
    show(ctx);
    Ok(())
}

fn manual_line(
    product_id: String,
    entry: ManualEntry,
    quantity: Quantity,
    custom_text: Option<String>,
) -> Result<CartLine, CartCommandError> {
    let unit_price = parse_price(&entry.price)?;
    let line = CartLine::new(product_id, entry.name, quantity, unit_price);
    Ok(match custom_text {
        Some(text) => line.with_custom_text(text),
        None => line,
    })
}

fn parse_price(price: &str) -> Result<Price, CartCommandError> {
    let amount = Decimal::from_str(price.trim_start_matches('$'))
        .map_err(|_| CartCommandError::InvalidPrice(price.to_owned()))?;
    Ok(Price::new(amount)?)
}

/// Remove the line at a 1-based position.
///
/// # Errors
///
/// Returns `CartError::OutOfRange` if no line is at `position`.
pub fn remove(ctx: &StorefrontContext, position: u32) -> Result<(), CartCommandError> {
    report_write(ctx.store().remove(index(position))?);
    show(ctx);
    Ok(())
}

/// Set the quantity of the line at a 1-based position.
///
/// # Errors
///
/// Returns `CartError::OutOfRange` if no line is at `position`.
pub fn set_quantity(
    ctx: &StorefrontContext,
    position: u32,
    quantity: i64,
) -> Result<(), CartCommandError> {
    report_write(ctx.store().set_quantity(index(position), quantity)?);
    show(ctx);
    Ok(())
}

/// Empty the cart, and the server cart too when `remote` is set.
///
/// # Errors
///
/// Returns `CartCommandError::Api` if the server cart cannot be cleared;
/// the local cart is then left as it was.
pub async fn clear(ctx: &StorefrontContext, remote: bool) -> Result<(), CartCommandError> {
    let write = if remote {
        ctx.clear_cart_everywhere().await?
    } else {
        ctx.store().clear()
    };
    report_write(write);
    show(ctx);
    Ok(())
}

fn index(position: u32) -> usize {
    usize::try_from(position.saturating_sub(1)).unwrap_or(usize::MAX)
}

#[allow(clippy::print_stderr)]
fn report_write(write: WriteThrough) {
    if let WriteThrough::Deferred(e) = write {
        eprintln!("warning: cart change not saved yet ({e}); it will be retried");
    }
}

/// Render cart lines with positions, then the totals.
pub fn render(cart: &Cart) -> String {
    use std::fmt::Write;

    if cart.is_empty() {
        return "Your cart is empty.\n".to_string();
    }

    let mut out = String::new();
    for (i, line) in cart.iter().enumerate() {
        let _ = write!(
            out,
            "{:>3}. {} x{} @ {} = {}",
            i + 1,
            line.product_name,
            line.quantity,
            line.unit_price,
            format_price(line.line_total())
        );
        if let Some(text) = &line.custom_text {
            let _ = write!(out, " | Custom: {text:?}");
        }
        out.push('\n');
    }

    let totals = cart.totals();
    let _ = writeln!(
        out,
        "Items: {}  Total: {}",
        totals.item_count,
        format_price(totals.total_price)
    );
    out
}

/// Format a decimal amount as dollars.
pub fn format_price(amount: Decimal) -> String {
    format!("${amount:.2}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Decimal::new(5998, 2)), "$59.98");
        assert_eq!(format_price(Decimal::new(5, 0)), "$5.00");
        assert_eq!(format_price(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_render_empty_cart() {
        assert_eq!(render(&Cart::new()), "Your cart is empty.\n");
    }

    #[test]
    fn test_render_lines_and_totals() {
        let cart = Cart::from_lines([
            CartLine::new(
                "cards",
                "Business Cards",
                Quantity::new(2).unwrap(),
                Price::from_cents(2999).unwrap(),
            ),
            CartLine::new("mug", "Mug", Quantity::ONE, Price::from_cents(1250).unwrap())
                .with_custom_text("Best Dad"),
        ]);

        let rendered = render(&cart);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "  1. Business Cards x2 @ $29.99 = $59.98");
        assert_eq!(lines[1], "  2. Mug x1 @ $12.50 = $12.50 | Custom: \"Best Dad\"");
        assert_eq!(lines[2], "Items: 3  Total: $72.48");
    }

    #[test]
    fn test_manual_line_parses_price() {
        let entry = ManualEntry {
            name: "Business Cards".to_string(),
            price: "$29.99".to_string(),
        };
        let line = manual_line("cards".to_string(), entry, Quantity::ONE, Some("HI".to_string()))
            .unwrap();
        assert_eq!(line.unit_price, Price::from_cents(2999).unwrap());
        assert_eq!(line.custom_text.as_deref(), Some("HI"));

        assert!(matches!(
            parse_price("twelve"),
            Err(CartCommandError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_price("-1"),
            Err(CartCommandError::NegativePrice(_))
        ));
    }

    #[test]
    fn test_positions_are_one_based() {
        assert_eq!(index(1), 0);
        assert_eq!(index(3), 2);
    }
}
