//! Catalog commands.

use std::fmt::Write;

use mattys_media_client::StorefrontContext;
use mattys_media_client::models::Product;
use mattys_media_client::services::api::ApiError;

use super::cart::format_price;

/// Print the catalog, optionally limited to one category.
///
/// # Errors
///
/// Returns `ApiError` if the catalog cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn list(ctx: &StorefrontContext, category: Option<&str>) -> Result<(), ApiError> {
    let products = ctx.api().list_products(category).await?;
    print!("{}", render(&products));
    Ok(())
}

/// One product per line: ID, name, category, and price.
pub fn render(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products found.\n".to_string();
    }

    let mut out = String::new();
    for product in products {
        let _ = writeln!(
            out,
            "{}  {} [{}]  {}",
            product.id,
            product.name,
            product.category,
            format_price(product.base_price)
        );
    }
    out
}
