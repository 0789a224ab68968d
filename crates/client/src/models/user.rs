//! Storefront user models.

use mattys_media_core::UserId;
use serde::{Deserialize, Serialize};

/// The authenticated user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user ID.
    pub id: UserId,
    /// Email address used to sign in.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Response body of the login and register endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// Profile of the signed-in user.
    pub user: User,
}
