//! Checkout command.

use mattys_media_client::StorefrontContext;
use mattys_media_client::services::checkout::CheckoutError;

/// Generate a WhatsApp order link for the current cart.
///
/// # Errors
///
/// Returns `CheckoutError` if not signed in, the cart is empty, or the
/// backend request fails.
#[allow(clippy::print_stdout)]
pub async fn whatsapp(ctx: &StorefrontContext) -> Result<(), CheckoutError> {
    let checkout = ctx.checkout_whatsapp().await?;
    println!("Open this link to send your order on WhatsApp:");
    println!("{}", checkout.whatsapp_url);
    Ok(())
}
