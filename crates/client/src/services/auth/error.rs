//! Authentication error types.

use thiserror::Error;

use crate::services::api::ApiError;
use crate::storage::StorageError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Registration with an email that already has an account.
    #[error("an account with this email already exists")]
    UserAlreadyExists,

    /// The operation needs a signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The credential could not be stored or removed.
    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),

    /// The backend request failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}
