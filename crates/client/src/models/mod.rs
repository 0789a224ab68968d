//! Domain models exchanged with the storefront backend.

pub mod product;
pub mod user;

pub use product::Product;
pub use user::{AuthResponse, User};
