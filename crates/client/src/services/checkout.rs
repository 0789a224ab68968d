//! WhatsApp checkout.
//!
//! Orders are placed by handing the customer a pre-filled WhatsApp message
//! summarizing their server cart.

use serde::Deserialize;
use thiserror::Error;

use super::api::ApiError;

/// Detail the backend returns when the server cart has no lines.
pub(crate) const EMPTY_CART_DETAIL: &str = "Cart is empty";

/// A generated WhatsApp order message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WhatsAppCheckout {
    /// `wa.me` link that opens WhatsApp with the message pre-filled.
    pub whatsapp_url: String,
    /// The URL-encoded order summary.
    pub message: String,
}

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("sign in to check out")]
    NotAuthenticated,

    #[error("cart is empty")]
    EmptyCart,

    #[error("checkout failed: {0}")]
    Api(ApiError),
}

impl From<ApiError> for CheckoutError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::NotAuthenticated,
            ApiError::Api { status: 400, ref message } if message == EMPTY_CART_DETAIL => {
                Self::EmptyCart
            }
            other => Self::Api(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cart_detail_maps_to_empty_cart() {
        let err = CheckoutError::from(ApiError::Api {
            status: 400,
            message: EMPTY_CART_DETAIL.to_string(),
        });
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[test]
    fn test_other_errors_pass_through() {
        assert!(matches!(
            CheckoutError::from(ApiError::Unauthorized),
            CheckoutError::NotAuthenticated
        ));
        assert!(matches!(
            CheckoutError::from(ApiError::Api {
                status: 502,
                message: "Bad Gateway".to_string()
            }),
            CheckoutError::Api(_)
        ));
    }
}
