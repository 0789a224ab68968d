//! The server side of reconciliation.

use std::future::Future;

use mattys_media_core::Cart;
use thiserror::Error;

use crate::services::api::ApiError;

/// Errors from a [`CartRemote`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No session credential is held.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The backend request failed.
    #[error(transparent)]
    Api(ApiError),

    /// The remote could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),
}

impl From<ApiError> for RemoteError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::NotAuthenticated,
            other => Self::Api(other),
        }
    }
}

/// Server-side cart storage for the signed-in user.
pub trait CartRemote: Send + Sync {
    /// Fetch the user's server cart. An unknown cart is an empty cart.
    fn fetch_cart(&self) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Replace the user's server cart with `cart`.
    fn push_cart(&self, cart: &Cart) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
